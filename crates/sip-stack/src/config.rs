//! The enumerated configuration surface of §6: `{ T1-ms, T2-ms, T4-ms,
//! listeners, dns-servers, max-message-bytes, max-forwards-default,
//! user-agent-string, record-route?, tcp-idle-timeout-ms }`, each with a
//! documented default matching RFC guidance.

use std::net::SocketAddr;
use std::time::Duration;

use sip_core::{Uri, DEFAULT_MAX_FORWARDS};
use sip_transport::Protocol;

/// One listener to bind at startup.
///
/// `tls_context` is accepted here because §6 names it as part of the
/// configuration surface, but `sip-transport`'s `TransportManager` only
/// binds `Udp`/`Tcp` today (TLS certificate management is an explicit
/// Non-goal) — a `Tls`/`Wss` entry is rejected by `SipStack::start` with a
/// clear error rather than silently falling back to plaintext.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub protocol: Protocol,
    pub addr: SocketAddr,
    pub tls_context: Option<TlsContext>,
}

impl ListenerConfig {
    pub fn new(protocol: Protocol, addr: SocketAddr) -> Self {
        ListenerConfig {
            protocol,
            addr,
            tls_context: None,
        }
    }
}

/// Placeholder for certificate material a TLS/WSS listener would need.
/// Carried in configuration only; nothing in this workspace reads it yet.
#[derive(Debug, Clone)]
pub struct TlsContext {
    pub cert_path: String,
    pub key_path: String,
}

/// RFC-guidance defaults for every knob §6 enumerates.
#[derive(Debug, Clone)]
pub struct StackConfig {
    pub t1: Duration,
    pub t2: Duration,
    pub t4: Duration,
    pub listeners: Vec<ListenerConfig>,
    /// Recursive DNS servers to consult ahead of the system resolver.
    /// `sip-transport::dns::Resolver` is a pluggable trait; the default
    /// `SystemResolver` ignores this list and always defers to
    /// `getaddrinfo`. It is carried here for a future NAPTR/SRV-capable
    /// resolver implementation (§6: "only the interface matters to the
    /// core; the implementation is external").
    pub dns_servers: Vec<SocketAddr>,
    pub max_message_bytes: usize,
    pub max_forwards_default: u32,
    pub user_agent: String,
    /// A Record-Route URI this process would insert if it acted as a
    /// proxy. Proxy forwarding logic is out of scope (§1 Non-goals: "no
    /// call-control semantics, no policy") so the stack never inserts
    /// this itself; it is exposed via `SipStack::config` for an embedding
    /// application that implements forwarding on top.
    pub record_route: Option<Uri>,
    pub tcp_idle_timeout: Duration,
}

impl Default for StackConfig {
    fn default() -> Self {
        let t1 = Duration::from_millis(500);
        StackConfig {
            t1,
            t2: Duration::from_secs(4),
            t4: Duration::from_secs(5),
            listeners: Vec::new(),
            dns_servers: Vec::new(),
            max_message_bytes: 8192,
            max_forwards_default: DEFAULT_MAX_FORWARDS,
            user_agent: format!("sip-stack/{}", env!("CARGO_PKG_VERSION")),
            record_route: None,
            tcp_idle_timeout: t1 * 64,
        }
    }
}

impl StackConfig {
    /// Defaults with a single listener bound to `addr`.
    pub fn new(protocol: Protocol, addr: SocketAddr) -> Self {
        StackConfig {
            listeners: vec![ListenerConfig::new(protocol, addr)],
            ..Default::default()
        }
    }

    pub fn with_listener(mut self, protocol: Protocol, addr: SocketAddr) -> Self {
        self.listeners.push(ListenerConfig::new(protocol, addr));
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_max_forwards_default(mut self, value: u32) -> Self {
        self.max_forwards_default = value;
        self
    }

    pub fn with_record_route(mut self, uri: Uri) -> Self {
        self.record_route = Some(uri);
        self
    }

    pub fn timer_settings(&self) -> sip_transaction::TimerSettings {
        sip_transaction::TimerSettings {
            t1: self.t1,
            t2: self.t2,
            t4: self.t4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_rfc_guidance() {
        let config = StackConfig::default();
        assert_eq!(config.t1, Duration::from_millis(500));
        assert_eq!(config.t2, Duration::from_secs(4));
        assert_eq!(config.t4, Duration::from_secs(5));
        assert_eq!(config.tcp_idle_timeout, Duration::from_secs(32));
        assert_eq!(config.max_message_bytes, 8192);
        assert_eq!(config.max_forwards_default, 70);
    }

    #[test]
    fn new_seeds_a_single_listener() {
        let config = StackConfig::new(Protocol::Udp, "0.0.0.0:5060".parse().unwrap());
        assert_eq!(config.listeners.len(), 1);
        assert_eq!(config.listeners[0].protocol, Protocol::Udp);
    }
}
