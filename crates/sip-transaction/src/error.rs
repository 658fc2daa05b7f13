//! Transaction-layer errors (§7's `TransactionTimeout`/`TransportError`
//! kinds, plus local programming errors the Dispatcher must never panic on).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("sip-core parse/encode error: {0}")]
    Core(#[from] sip_core::Error),

    #[error("transport error: {0}")]
    Transport(#[from] sip_transport::Error),

    #[error("no transaction matches id {0}")]
    NoSuchTransaction(String),

    #[error("request is missing a required header: {0}")]
    MissingHeader(&'static str),

    #[error("cannot send a {0} as a new client transaction's initial request")]
    InvalidInitialRequest(sip_core::Method),
}
