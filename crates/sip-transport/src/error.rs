//! Transport-layer errors (§7's `TransportError` and `ParseError` framing
//! causes that originate below the message parser).

use std::net::SocketAddr;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sip-core parse/encode error: {0}")]
    Core(#[from] sip_core::Error),

    #[error("datagram of {actual} bytes exceeds the {limit} byte frame limit")]
    FrameTooLarge { actual: usize, limit: usize },

    #[error("transport is closed")]
    Closed,

    #[error("no listener/connection available for transport hint {0:?}")]
    NoRoute(String),

    #[error("DNS resolution failed for {host}: {reason}")]
    DnsFailure { host: String, reason: String },

    #[error("connection to {0} reset")]
    ConnectionReset(SocketAddr),
}
