//! The transport plug-in contract (§6) and the transport tuple addressing
//! key (§3).

use std::fmt;
use std::net::SocketAddr;

use async_trait::async_trait;
use sip_core::Message;

use crate::error::Result;

/// The wire protocol a transport speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Udp,
    Tcp,
    Tls,
    Ws,
    Wss,
}

impl Protocol {
    pub fn is_stream(self) -> bool {
        !matches!(self, Protocol::Udp)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Udp => "UDP",
            Protocol::Tcp => "TCP",
            Protocol::Tls => "TLS",
            Protocol::Ws => "WS",
            Protocol::Wss => "WSS",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Protocol {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UDP" => Ok(Protocol::Udp),
            "TCP" => Ok(Protocol::Tcp),
            "TLS" => Ok(Protocol::Tls),
            "WS" => Ok(Protocol::Ws),
            "WSS" => Ok(Protocol::Wss),
            _ => Err(()),
        }
    }
}

/// `(protocol, local address/port, peer address/port)` — the addressing key
/// for both outbound send and for looking up which transport delivered an
/// inbound datagram/stream (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportTuple {
    pub protocol: Protocol,
    pub local: SocketAddr,
    pub peer: SocketAddr,
}

impl fmt::Display for TransportTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}<->{}", self.protocol, self.local, self.peer)
    }
}

/// Events a transport delivers upward, independent of its concrete kind.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A complete message was framed and parsed.
    MessageReceived { message: Message, tuple: TransportTuple },
    /// Framing or parsing failed; the bytes were dropped (§7 `ParseError`).
    FrameError { peer: SocketAddr, reason: String },
    /// A stream transport's connection was lost.
    ConnectionLost { tuple: TransportTuple, reason: String },
    /// The transport endpoint itself shut down.
    Closed,
}

/// The transport plug-in contract (§6): every concrete transport
/// (UDP/TCP/TLS/WS) implements this so the Transport Manager and
/// Transaction Layer can treat them uniformly.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    fn protocol(&self) -> Protocol;

    fn local_addr(&self) -> SocketAddr;

    /// Non-blocking from the caller's point of view: queues the bytes for
    /// send, or fails immediately if the transport is closed or (for stream
    /// transports) no connection to `peer` can be established.
    async fn send(&self, peer: SocketAddr, message: &Message) -> Result<()>;

    async fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;
}
