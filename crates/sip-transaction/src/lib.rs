//! # sip-transaction
//!
//! The RFC 3261 transaction layer: the four client/server state machines,
//! the timer wheel that drives their retransmissions and timeouts, and the
//! single-threaded [`Dispatcher`] that owns both outright. No lock is ever
//! held across an await point in here — the table and the wheel are only
//! ever touched from the dispatcher's own loop.
//!
//! This crate has no opinion about dialogs, SDP, or registration; it only
//! guarantees the properties RFC 3261 §17 asks a transaction layer for:
//! duplicate suppression, automatic ACK of non-2xx final responses, and a
//! CANCEL that reliably finds the INVITE it cancels.

pub mod dispatcher;
pub mod error;
pub mod key;
pub mod stats;
pub mod timer;
pub mod transaction;

pub use dispatcher::{Dispatcher, TuCommand, TuEvent};
pub use error::{Error, Result};
pub use key::TransactionKey;
pub use stats::{Stats, StatsSnapshot};
pub use timer::{TimerHandle, TimerKind, TimerSettings};
pub use transaction::{ClientState, ClientTransaction, ServerState, ServerTransaction};

/// Commonly used re-exports for downstream crates and applications.
pub mod prelude {
    pub use crate::{
        Dispatcher, Error, Result, StatsSnapshot, TimerSettings, TransactionKey, TuCommand,
        TuEvent,
    };
}
