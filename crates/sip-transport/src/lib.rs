//! # sip-transport
//!
//! The Transport Manager (§4.3): binds listeners, opens outbound
//! connections, frames bytes into messages (the decode half of the wire
//! codec, pass 0 before sip-core's message parser ever runs), and surfaces
//! everything through one merged [`TransportEvent`] stream.

pub mod codec;
pub mod dns;
pub mod error;
pub mod manager;
pub mod nat;
pub mod tcp;
pub mod transport;
pub mod udp;

pub use error::{Error, Result};
pub use manager::{ListenerSpec, TransportManager, TransportManagerConfig};
pub use transport::{Protocol, Transport, TransportEvent, TransportTuple};

pub mod prelude {
    pub use crate::{
        Error, ListenerSpec, Protocol, Result, Transport, TransportEvent, TransportManager,
        TransportManagerConfig, TransportTuple,
    };
}
