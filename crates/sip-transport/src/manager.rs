//! The Transport Manager (§4.3): owns every bound listener, opens outbound
//! connections on demand, and merges every transport's event stream into
//! one queue for the Transaction Layer to poll.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::info;

use sip_core::{Message, Uri};

use crate::dns::{Resolver, SystemResolver};
use crate::error::{Error, Result};
use crate::nat;
use crate::tcp::TcpTransport;
use crate::transport::{Protocol, Transport, TransportEvent};
use crate::udp::UdpTransport;

/// What to bind on startup: one entry per `(protocol, local address)`.
#[derive(Debug, Clone, Copy)]
pub struct ListenerSpec {
    pub protocol: Protocol,
    pub addr: SocketAddr,
}

pub struct TransportManagerConfig {
    pub listeners: Vec<ListenerSpec>,
    pub max_message_bytes: usize,
    pub tcp_idle_timeout: Duration,
}

impl Default for TransportManagerConfig {
    fn default() -> Self {
        TransportManagerConfig {
            listeners: Vec::new(),
            max_message_bytes: 8192,
            tcp_idle_timeout: crate::tcp::DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Routes outbound sends to the right bound transport (opening one on
/// demand for TCP), and hands every transport's inbound events up through a
/// single merged channel.
pub struct TransportManager {
    udp: Mutex<HashMap<SocketAddr, UdpTransport>>,
    tcp: Mutex<HashMap<SocketAddr, TcpTransport>>,
    resolver: Arc<dyn Resolver>,
    max_message_bytes: usize,
    tcp_idle_timeout: Duration,
    events_tx: mpsc::Sender<TransportEvent>,
}

impl TransportManager {
    pub async fn start(
        config: TransportManagerConfig,
    ) -> Result<(Arc<Self>, mpsc::Receiver<TransportEvent>)> {
        let (events_tx, events_rx) = mpsc::channel(256);
        let manager = Arc::new(TransportManager {
            udp: Mutex::new(HashMap::new()),
            tcp: Mutex::new(HashMap::new()),
            resolver: Arc::new(SystemResolver),
            max_message_bytes: config.max_message_bytes,
            tcp_idle_timeout: config.tcp_idle_timeout,
            events_tx,
        });

        for spec in &config.listeners {
            manager.bind(spec.protocol, spec.addr).await?;
        }

        Ok((manager, events_rx))
    }

    pub async fn bind(&self, protocol: Protocol, addr: SocketAddr) -> Result<()> {
        match protocol {
            Protocol::Udp => {
                let (transport, rx) =
                    UdpTransport::bind(addr, self.max_message_bytes, None).await?;
                let local = transport.local_addr();
                self.udp.lock().await.insert(local, transport);
                self.forward(rx);
                info!(%local, "UDP listener bound");
            }
            Protocol::Tcp => {
                let (transport, rx) = TcpTransport::bind(
                    addr,
                    self.max_message_bytes,
                    self.tcp_idle_timeout,
                    None,
                )
                .await?;
                let local = transport.local_addr();
                self.tcp.lock().await.insert(local, transport);
                self.forward(rx);
                info!(%local, "TCP listener bound");
            }
            other => return Err(Error::NoRoute(format!("unsupported listener protocol {other}"))),
        }
        Ok(())
    }

    /// The local address of the first bound listener for `protocol`, if
    /// any. Mainly useful to callers (and tests) that bound to an ephemeral
    /// port and need to learn what the OS actually assigned.
    pub async fn local_addr(&self, protocol: Protocol) -> Option<SocketAddr> {
        match protocol {
            Protocol::Udp => self.udp.lock().await.keys().next().copied(),
            Protocol::Tcp => self.tcp.lock().await.keys().next().copied(),
            _ => None,
        }
    }

    /// Merges one transport's event stream into the manager's, stamping
    /// `received`/`rport` (§18.2.1) on every inbound request before the
    /// Transaction Layer ever sees it — this is the one place every
    /// transport's events pass through, so the stamping happens exactly
    /// once regardless of which transport delivered the request.
    fn forward(&self, mut rx: mpsc::Receiver<TransportEvent>) {
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            while let Some(mut event) = rx.recv().await {
                if let TransportEvent::MessageReceived { message, tuple } = &mut event {
                    nat::stamp_received_and_rport(message, tuple);
                }
                if events_tx.send(event).await.is_err() {
                    break;
                }
            }
        });
    }

    /// Resolve `target` to the `(protocol, address)` the Transport Manager
    /// would send to, without sending anything. Callers that need to
    /// remember the chosen destination (e.g. the Transaction Layer, which
    /// must retransmit to the same peer) resolve once and then use
    /// [`TransportManager::send_to`] directly.
    pub async fn resolve(&self, target: &Uri) -> Result<(Protocol, SocketAddr)> {
        let transport_hint = target
            .transport_param()
            .and_then(|t| t.parse::<Protocol>().ok());
        let destinations = self
            .resolver
            .resolve(&target.host, target.port, transport_hint)
            .await?;
        let destination = destinations
            .first()
            .ok_or_else(|| Error::NoRoute(target.host.clone()))?;
        Ok((destination.protocol, destination.addr))
    }

    /// Resolve `target` and send `message` to it, opening an outbound
    /// connection if the chosen transport is stream-based and none exists
    /// yet (§4.3).
    pub async fn send(&self, target: &Uri, message: &Message) -> Result<()> {
        let (protocol, addr) = self.resolve(target).await?;
        self.send_to(protocol, addr, message).await
    }

    pub async fn send_to(
        &self,
        protocol: Protocol,
        peer: SocketAddr,
        message: &Message,
    ) -> Result<()> {
        match protocol {
            Protocol::Udp => {
                let udp = self.udp.lock().await;
                let transport = udp
                    .values()
                    .next()
                    .ok_or_else(|| Error::NoRoute(peer.to_string()))?;
                transport.send(peer, message).await
            }
            Protocol::Tcp => {
                let transport = {
                    let tcp = self.tcp.lock().await;
                    tcp.values().next().cloned()
                };
                let transport = match transport {
                    Some(t) => t,
                    None => return Err(Error::NoRoute(peer.to_string())),
                };
                transport.send(peer, message).await
            }
            other => Err(Error::NoRoute(format!("unsupported transport {other}"))),
        }
    }

    pub async fn close(&self) -> Result<()> {
        for transport in self.udp.lock().await.values() {
            transport.close().await?;
        }
        for transport in self.tcp.lock().await.values() {
            transport.close().await?;
        }
        Ok(())
    }
}
