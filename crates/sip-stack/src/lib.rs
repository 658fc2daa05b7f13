//! # sip-stack
//!
//! The thin facade an embedding application links against: wires the
//! Transport Manager (`sip-transport`), the Timer Wheel and Dispatcher
//! (`sip-transaction`), and the wire codec/data model (`sip-core`) into one
//! `SipStack` handle, per §6's external interfaces.
//!
//! This crate adds no protocol behavior of its own beyond what the
//! dispatched request/response construction helpers need (stamping
//! Max-Forwards/User-Agent defaults, building a CANCEL for an outstanding
//! client INVITE transaction). Everything else is the three crates it wires
//! together.
//!
//! ```no_run
//! use sip_stack::{SipStack, StackConfig};
//! use sip_transport::Protocol;
//!
//! # async fn run() -> sip_stack::Result<()> {
//! let config = StackConfig::new(Protocol::Udp, "0.0.0.0:5060".parse().unwrap());
//! let (stack, mut events) = SipStack::start(config).await?;
//!
//! let request = stack
//!     .new_request(sip_core::Method::Options, "sip:bob@biloxi.com")?
//!     .from("Alice", "sip:alice@atlanta.com", Some("1928301774"))
//!     .to("Bob", "sip:bob@biloxi.com", None)
//!     .call_id(&sip_core::ids::new_call_id("atlanta.com"))
//!     .cseq(1)
//!     .via("atlanta.com", "UDP", Some(&sip_core::ids::new_branch()))
//!     .build();
//! stack.send(request, "sip:bob@biloxi.com".parse().unwrap()).await?;
//!
//! while let Some(event) = events.recv().await {
//!     tracing::debug!(?event, "TU event");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;

pub use config::{ListenerConfig, StackConfig, TlsContext};
pub use error::{Error, Result};

pub use sip_transaction::{StatsSnapshot, TransactionKey, TuCommand, TuEvent};

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use sip_core::{Method, Request, RequestBuilder, Response, Uri};
use sip_transaction::{Dispatcher, Stats};
use sip_transport::{ListenerSpec, TransportManager, TransportManagerConfig};

/// The handle an embedding application holds. Cheap to clone (everything
/// inside is an `Arc` or a channel sender); every clone talks to the same
/// dispatcher task.
#[derive(Clone)]
pub struct SipStack {
    transport: Arc<TransportManager>,
    tu_tx: mpsc::Sender<TuCommand>,
    stats: Arc<Stats>,
    config: Arc<StackConfig>,
}

impl SipStack {
    /// Binds every configured listener, starts the dispatcher task, and
    /// returns the stack handle alongside the TU's event receiver. The
    /// receiver is handed back rather than wrapped behind `&mut self`
    /// methods, mirroring `Dispatcher::new`'s own queue-pair shape (§6).
    pub async fn start(config: StackConfig) -> Result<(Self, mpsc::Receiver<TuEvent>)> {
        if config.listeners.is_empty() {
            return Err(Error::NoListeners);
        }
        for listener in &config.listeners {
            if !matches!(listener.protocol, sip_transport::Protocol::Udp | sip_transport::Protocol::Tcp) {
                return Err(Error::UnsupportedListener(listener.protocol));
            }
        }

        let transport_config = TransportManagerConfig {
            listeners: config
                .listeners
                .iter()
                .map(|l| ListenerSpec {
                    protocol: l.protocol,
                    addr: l.addr,
                })
                .collect(),
            max_message_bytes: config.max_message_bytes,
            tcp_idle_timeout: config.tcp_idle_timeout,
        };
        let (transport, transport_events) = TransportManager::start(transport_config).await?;

        let (dispatcher, tu_tx, tu_rx) =
            Dispatcher::new(transport.clone(), transport_events, config.timer_settings());
        let stats = dispatcher.stats_handle();
        tokio::spawn(dispatcher.run());

        info!(listeners = config.listeners.len(), "sip-stack dispatcher started");

        let stack = SipStack {
            transport,
            tu_tx,
            stats,
            config: Arc::new(config),
        };
        Ok((stack, tu_rx))
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// A `RequestBuilder` pre-seeded with this stack's configured
    /// Max-Forwards and User-Agent defaults (§2 "Supplemented features":
    /// the original source's builder helpers do the same stamping).
    pub fn new_request(&self, method: Method, uri: &str) -> sip_core::Result<RequestBuilder> {
        Ok(RequestBuilder::new(method, uri)?
            .max_forwards(self.config.max_forwards_default)
            .user_agent(&self.config.user_agent))
    }

    /// Opens a new client transaction for `request`, sent to `destination`
    /// (§6 "From TU": `send(message)`).
    pub async fn send(&self, request: Request, destination: Uri) -> Result<()> {
        self.tu_tx
            .send(TuCommand::Send { request, destination })
            .await
            .map_err(|_| Error::StackShutDown)
    }

    /// Answers an existing server transaction (§6: the TU's half of
    /// `on-request`/`on-transaction-terminated` round trips).
    pub async fn respond(&self, server_transaction_id: TransactionKey, response: Response) -> Result<()> {
        self.tu_tx
            .send(TuCommand::Respond { server_transaction_id, response })
            .await
            .map_err(|_| Error::StackShutDown)
    }

    /// Forcibly destroys a client transaction without sending anything
    /// further (§6 "From TU": `end-client-transaction(transaction-id)`).
    pub async fn end_client_transaction(&self, transaction_id: TransactionKey) -> Result<()> {
        self.tu_tx
            .send(TuCommand::EndClientTransaction { transaction_id })
            .await
            .map_err(|_| Error::StackShutDown)
    }

    /// Cancels an outstanding client INVITE (§6 "From TU": `cancel(transaction-id)`).
    /// A CANCEL is its own non-INVITE transaction (RFC 3261 §9.1), so this
    /// builds one from the original INVITE and opens a client transaction
    /// for it exactly like any other outbound request — the transaction-id
    /// named by §6 identifies which INVITE to cancel, not a command the
    /// dispatcher applies directly to an existing record.
    pub async fn cancel(&self, original_invite: &Request, destination: Uri) -> Result<()> {
        let cancel = cancel_request(original_invite);
        self.send(cancel, destination).await
    }

    /// The `TransportManager` this stack bound, for callers that need raw
    /// transport introspection (tests, operational tooling).
    pub fn transport(&self) -> &Arc<TransportManager> {
        &self.transport
    }
}

/// Builds the CANCEL for `original`, an outstanding INVITE (RFC 3261
/// §9.1): same Request-URI, Call-ID, From, To (no tag — the dialog isn't
/// established), CSeq number (method becomes CANCEL), and the same top Via
/// with the same branch so it reaches the same server transaction's peer.
pub fn cancel_request(original: &Request) -> Request {
    let mut builder = RequestBuilder::new(Method::Cancel, &original.uri.to_string())
        .expect("original request URI is already a valid URI");

    if let Some(via) = original.top_via() {
        builder = builder.via(&via.sent_by().0, &via.transport, via.branch());
    }
    if let Some(from) = original.from() {
        builder = builder.from(
            from.display_name.as_deref().unwrap_or(""),
            &from.uri.to_string(),
            from.tag(),
        );
    }
    if let Some(to) = original.to() {
        builder = builder.to(to.display_name.as_deref().unwrap_or(""), &to.uri.to_string(), None);
    }
    if let Some(call_id) = original.call_id() {
        builder = builder.call_id(call_id);
    }
    if let Some((seq, _)) = original.cseq() {
        builder = builder.cseq(seq);
    }
    if let Some(max_forwards) = original.max_forwards() {
        builder = builder.max_forwards(max_forwards as u32);
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sip_core::RequestBuilder;

    fn sample_invite() -> Request {
        RequestBuilder::new(Method::Invite, "sip:bob@biloxi.com")
            .unwrap()
            .from("Alice", "sip:alice@atlanta.com", Some("1928301774"))
            .to("Bob", "sip:bob@biloxi.com", None)
            .call_id("a84b4c76e66710@pc33.atlanta.com")
            .cseq(314159)
            .via("pc33.atlanta.com", "UDP", Some("z9hG4bK776asdhds"))
            .max_forwards(70)
            .build()
    }

    #[test]
    fn cancel_keeps_the_invite_branch_and_strips_the_to_tag() {
        let invite = sample_invite();
        let cancel = cancel_request(&invite);

        assert_eq!(cancel.method, Method::Cancel);
        assert_eq!(cancel.top_via().unwrap().branch(), invite.top_via().unwrap().branch());
        assert_eq!(cancel.call_id(), invite.call_id());
        assert_eq!(cancel.cseq().unwrap().0, 314159);
        assert!(cancel.to().unwrap().tag().is_none());
    }
}
