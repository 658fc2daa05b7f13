//! Transaction records and the state enums of §3/§4.5. The four state
//! machines share these shapes but never share a `consume()` virtual
//! method — the Dispatcher matches on state and event as plain tagged
//! data (§9's re-architecture hint on virtual dispatch over consumers).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use sip_core::{Request, Response, StatusCode};
use sip_transport::Protocol;

use crate::timer::{TimerHandle, TimerKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Calling,
    Trying,
    Proceeding,
    Completed,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Trying,
    Proceeding,
    Completed,
    Confirmed,
    Terminated,
}

/// An outstanding client (INVITE or non-INVITE) transaction.
pub struct ClientTransaction {
    pub is_invite: bool,
    pub state: ClientState,
    pub request: Request,
    pub peer: SocketAddr,
    pub protocol: Protocol,
    pub reliable_transport: bool,
    pub timers: HashMap<TimerKind, TimerHandle>,
    pub retransmit_interval: Duration,
    /// Bumped every time the transaction changes state, so a timer firing
    /// scheduled against a stale state can be recognized and dropped
    /// (§5 "Cancellation").
    pub epoch: u64,
    /// Set once the first 2xx has been surfaced, so a second 2xx from a
    /// forked branch is still delivered (§3 invariant) but never confused
    /// for the same event.
    pub sent_2xx_to_tu: bool,
}

impl ClientTransaction {
    pub fn new(request: Request, peer: SocketAddr, protocol: Protocol, is_invite: bool) -> Self {
        let reliable_transport = protocol.is_stream();
        ClientTransaction {
            is_invite,
            state: if is_invite {
                ClientState::Calling
            } else {
                ClientState::Trying
            },
            request,
            peer,
            protocol,
            reliable_transport,
            timers: HashMap::new(),
            retransmit_interval: Duration::from_millis(500),
            epoch: 0,
            sent_2xx_to_tu: false,
        }
    }

    pub fn bump_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }
}

/// An outstanding server (INVITE or non-INVITE) transaction.
pub struct ServerTransaction {
    pub is_invite: bool,
    pub state: ServerState,
    pub request: Request,
    pub peer: SocketAddr,
    pub protocol: Protocol,
    pub reliable_transport: bool,
    pub timers: HashMap<TimerKind, TimerHandle>,
    pub retransmit_interval: Duration,
    pub epoch: u64,
    /// The most recently sent final response, kept so a retransmitted
    /// request can be answered without re-invoking the TU (§3 invariant:
    /// "never emits two different final responses").
    pub last_final_response: Option<Response>,
    /// The most recently sent provisional, used to re-emit on a duplicate
    /// request while still in Proceeding.
    pub last_provisional_response: Option<Response>,
    pub sent_final_status: Option<StatusCode>,
}

impl ServerTransaction {
    pub fn new(request: Request, peer: SocketAddr, protocol: Protocol, is_invite: bool) -> Self {
        let reliable_transport = protocol.is_stream();
        ServerTransaction {
            is_invite,
            state: if is_invite {
                ServerState::Proceeding
            } else {
                ServerState::Trying
            },
            request,
            peer,
            protocol,
            reliable_transport,
            timers: HashMap::new(),
            retransmit_interval: Duration::from_millis(500),
            epoch: 0,
            last_final_response: None,
            last_provisional_response: None,
            sent_final_status: None,
        }
    }

    pub fn bump_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }
}
