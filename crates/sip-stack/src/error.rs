//! Facade-level errors: mostly pass-through from the crates this wires
//! together, plus the handful of configuration mistakes only `SipStack`
//! can detect (an unsupported listener protocol, an empty listener list).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("sip-core error: {0}")]
    Core(#[from] sip_core::Error),

    #[error("transport error: {0}")]
    Transport(#[from] sip_transport::Error),

    #[error("transaction layer error: {0}")]
    Transaction(#[from] sip_transaction::Error),

    #[error("no listeners configured; StackConfig needs at least one")]
    NoListeners,

    #[error("listener protocol {0} has no transport implementation (TLS/WS/WSS certificate management is out of scope)")]
    UnsupportedListener(sip_transport::Protocol),

    #[error("the dispatcher's TU channel closed; the stack has shut down")]
    StackShutDown,
}
