//! The Dispatcher (§4.6): the single event loop that owns the transaction
//! table and timer wheel outright, with no locking (§5). It pulls from
//! three sources — inbound transport events, TU commands, and timer
//! firings — and is the only place any transaction record is mutated.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, trace, warn};

use sip_core::{
    invite_lookup_fingerprint, Fingerprint, Message, Method, Request, RequestBuilder, Response,
    ResponseBuilder, StatusCode, Uri,
};
use sip_transport::{TransportEvent, TransportManager, TransportTuple};

use crate::error::{Error, Result};
use crate::key::TransactionKey;
use crate::stats::{Stats, StatsSnapshot};
use crate::timer::{TimerKind, TimerSettings, TimerWheel};
use crate::transaction::{ClientState, ClientTransaction, ServerState, ServerTransaction};

const DRAIN_BATCH: usize = 16;
const SLEEP_CEILING: Duration = Duration::from_millis(25);

/// What the TU posts to the core (§6 "From TU").
pub enum TuCommand {
    /// Send a brand new request, opening a client transaction for it.
    Send { request: Request, destination: Uri },
    /// Send a response on behalf of an existing server transaction
    /// (e.g. the 200 OK a TU sends to accept a CANCEL, or the 487 an
    /// INVITE server transaction is instructed to send).
    Respond {
        server_transaction_id: TransactionKey,
        response: Response,
    },
    /// Abort a client transaction immediately, per §5 "Cancellation".
    EndClientTransaction { transaction_id: TransactionKey },
}

/// What the core delivers to the TU (§6 "To TU").
#[derive(Debug)]
pub enum TuEvent {
    OnRequest {
        request: Request,
        server_transaction_id: TransactionKey,
    },
    OnResponse {
        response: Response,
        client_transaction_id: TransactionKey,
    },
    OnTransportFailure {
        transaction_id: TransactionKey,
        cause: String,
    },
    OnTransactionTerminated {
        transaction_id: TransactionKey,
    },
}

pub struct Dispatcher {
    transport: Arc<TransportManager>,
    transport_events: mpsc::Receiver<TransportEvent>,
    tu_rx: mpsc::Receiver<TuCommand>,
    tu_tx: mpsc::Sender<TuEvent>,
    timers: TimerWheel,
    settings: TimerSettings,
    client_txns: HashMap<Fingerprint, ClientTransaction>,
    server_txns: HashMap<Fingerprint, ServerTransaction>,
    stats: Arc<Stats>,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<TransportManager>,
        transport_events: mpsc::Receiver<TransportEvent>,
        settings: TimerSettings,
    ) -> (Self, mpsc::Sender<TuCommand>, mpsc::Receiver<TuEvent>) {
        let (tu_tx, tu_rx_out) = mpsc::channel(256);
        let (tu_cmd_tx, tu_rx) = mpsc::channel(256);
        let dispatcher = Dispatcher {
            transport,
            transport_events,
            tu_rx,
            tu_tx,
            timers: TimerWheel::new(),
            settings,
            client_txns: HashMap::new(),
            server_txns: HashMap::new(),
            stats: Arc::new(Stats::new()),
        };
        (dispatcher, tu_cmd_tx, tu_rx_out)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// A cloned handle to the counters this dispatcher updates, for a
    /// caller that needs to keep reading them after `run()` has taken
    /// ownership of `self`.
    pub fn stats_handle(&self) -> Arc<Stats> {
        self.stats.clone()
    }

    /// Runs forever. Exits only once both input channels close (the
    /// transport manager and the TU side have both been dropped).
    pub async fn run(mut self) {
        loop {
            let mut did_work = false;

            for _ in 0..DRAIN_BATCH {
                match self.transport_events.try_recv() {
                    Ok(event) => {
                        self.handle_transport_event(event).await;
                        did_work = true;
                    }
                    Err(_) => break,
                }
            }

            for _ in 0..DRAIN_BATCH {
                match self.tu_rx.try_recv() {
                    Ok(cmd) => {
                        self.handle_tu_command(cmd).await;
                        did_work = true;
                    }
                    Err(_) => break,
                }
            }

            let due = self.timers.pop_due();
            if !due.is_empty() {
                did_work = true;
            }
            for firing in due {
                self.handle_timer_firing(firing).await;
            }

            if did_work {
                continue;
            }

            let now = Instant::now();
            let deadline = self
                .timers
                .next_deadline()
                .map(|d| d.min(now + SLEEP_CEILING))
                .unwrap_or(now + SLEEP_CEILING);

            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {}
                event = self.transport_events.recv() => {
                    match event {
                        Some(e) => self.handle_transport_event(e).await,
                        None if self.tu_rx.is_closed() => return,
                        None => {}
                    }
                }
                cmd = self.tu_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_tu_command(c).await,
                        None if self.transport_events.is_closed() => return,
                        None => {}
                    }
                }
            }
        }
    }

    // ---- transport events -------------------------------------------------

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::MessageReceived { message, tuple } => match message {
                Message::Request(req) => self.handle_inbound_request(req, tuple).await,
                Message::Response(resp) => self.handle_inbound_response(resp, tuple).await,
            },
            TransportEvent::FrameError { peer, reason } => {
                self.stats.record_parse_error();
                trace!(%peer, %reason, "dropped unparseable frame");
            }
            TransportEvent::ConnectionLost { tuple, reason } => {
                self.fail_transactions_on(tuple.peer, &reason).await;
            }
            TransportEvent::Closed => {
                info!("a transport endpoint closed");
            }
        }
    }

    async fn fail_transactions_on(&mut self, peer: SocketAddr, reason: &str) {
        let stale: Vec<Fingerprint> = self
            .client_txns
            .iter()
            .filter(|(_, t)| t.peer == peer && t.state != ClientState::Terminated)
            .map(|(k, _)| k.clone())
            .collect();

        for fingerprint in stale {
            if let Some(mut txn) = self.client_txns.remove(&fingerprint) {
                for (_, handle) in txn.timers.drain() {
                    self.timers.cancel(handle);
                }
                txn.state = ClientState::Terminated;
                let key = TransactionKey::client(fingerprint.clone());
                self.stats.record_transport_failure();
                let _ = self
                    .tu_tx
                    .send(TuEvent::OnTransportFailure {
                        transaction_id: key.clone(),
                        cause: reason.to_string(),
                    })
                    .await;
                let _ = self
                    .tu_tx
                    .send(TuEvent::OnTransactionTerminated { transaction_id: key })
                    .await;
            }
        }
    }

    // ---- inbound requests ---------------------------------------------------

    async fn handle_inbound_request(&mut self, req: Request, tuple: TransportTuple) {
        if !req.has_required_headers() {
            self.stats.record_parse_error();
            warn!("dropped request missing required headers");
            return;
        }

        let Some(fingerprint) = sip_core::request_fingerprint(&req) else {
            self.stats.record_stray_request();
            return;
        };

        match req.method {
            Method::Ack => self.handle_inbound_ack(req, tuple).await,
            Method::Cancel => self.handle_inbound_cancel(req, tuple, fingerprint).await,
            _ => self.handle_inbound_ordinary_request(req, tuple, fingerprint).await,
        }
    }

    async fn handle_inbound_ordinary_request(
        &mut self,
        req: Request,
        tuple: TransportTuple,
        fingerprint: Fingerprint,
    ) {
        if let Some(txn) = self.server_txns.get(&fingerprint) {
            // Retransmission of a request already being (or already)
            // handled: absorb it and re-emit whatever we last sent,
            // never re-invoking the TU (§4.5).
            self.stats.record_duplicate_dropped();
            let resend = match txn.state {
                ServerState::Proceeding => txn
                    .last_provisional_response
                    .clone()
                    .or_else(|| txn.last_final_response.clone()),
                ServerState::Completed | ServerState::Confirmed => txn.last_final_response.clone(),
                _ => None,
            };
            if let Some(response) = resend {
                let _ = self
                    .transport
                    .send_to(tuple.protocol, tuple.peer, &Message::Response(response))
                    .await;
            }
            return;
        }

        let is_invite = req.method == Method::Invite;
        let txn = ServerTransaction::new(req.clone(), tuple.peer, tuple.protocol, is_invite);
        self.server_txns.insert(fingerprint.clone(), txn);

        let key = TransactionKey::server(fingerprint);
        let _ = self
            .tu_tx
            .send(TuEvent::OnRequest {
                request: req,
                server_transaction_id: key,
            })
            .await;
    }

    async fn handle_inbound_ack(&mut self, req: Request, tuple: TransportTuple) {
        let Some(invite_fp) = invite_lookup_fingerprint(&req) else {
            return;
        };

        if let Some(txn) = self.server_txns.get_mut(&invite_fp) {
            if txn.is_invite && txn.state == ServerState::Completed {
                for (_, handle) in txn.timers.drain() {
                    self.timers.cancel(handle);
                }
                txn.state = ServerState::Confirmed;
                let epoch = txn.bump_epoch();
                let reliable = txn.reliable_transport;
                let handle = self.timers.schedule(
                    self.settings.duplicate_absorption(reliable),
                    TransactionKey::server(invite_fp),
                    TimerKind::I,
                    epoch,
                );
                txn.timers.insert(TimerKind::I, handle);
                return;
            }
        }

        // ACK for a 2xx (or for an INVITE this stack never saw as a
        // server transaction): no transaction is created; deliver
        // directly to the TU per §4.5.
        let ephemeral = TransactionKey::server(
            sip_core::request_fingerprint(&req).unwrap_or(invite_fp),
        );
        let _ = self
            .tu_tx
            .send(TuEvent::OnRequest {
                request: req,
                server_transaction_id: ephemeral,
            })
            .await;
        let _ = tuple;
    }

    async fn handle_inbound_cancel(
        &mut self,
        req: Request,
        tuple: TransportTuple,
        cancel_fingerprint: Fingerprint,
    ) {
        let Some(invite_fp) = invite_lookup_fingerprint(&req) else {
            return;
        };

        if !self
            .server_txns
            .get(&invite_fp)
            .map(|t| t.is_invite)
            .unwrap_or(false)
        {
            // No INVITE server transaction exists for this fingerprint at
            // all (matching never depends on a provisional having been
            // sent, since `ServerTransaction::new` enters `Proceeding`
            // immediately; see DESIGN.md) -> RFC 3261 §9.2's 481, sent
            // directly without involving the TU.
            let response = ResponseBuilder::for_request(StatusCode::new(481).unwrap(), None, &req).build();
            let _ = self
                .transport
                .send_to(tuple.protocol, tuple.peer, &Message::Response(response))
                .await;
            return;
        }

        if self.server_txns.contains_key(&cancel_fingerprint) {
            self.stats.record_duplicate_dropped();
            return;
        }

        let cancel_txn = ServerTransaction::new(req.clone(), tuple.peer, tuple.protocol, false);
        self.server_txns.insert(cancel_fingerprint.clone(), cancel_txn);

        let _ = self
            .tu_tx
            .send(TuEvent::OnRequest {
                request: req,
                server_transaction_id: TransactionKey::server(cancel_fingerprint),
            })
            .await;

        // Instruct the matched INVITE server transaction to respond 487,
        // per §4.5. The TU still separately accepts the CANCEL (typically
        // with 200) via `TuCommand::Respond` against the CANCEL's own key.
        if let Some(invite_txn) = self.server_txns.get(&invite_fp) {
            if invite_txn.state == ServerState::Proceeding {
                let request_terminated = ResponseBuilder::for_request(
                    StatusCode::REQUEST_TERMINATED,
                    None,
                    &invite_txn.request,
                )
                .build();
                self.send_server_final(invite_fp, request_terminated).await;
            }
        }
    }

    // ---- inbound responses --------------------------------------------------

    async fn handle_inbound_response(&mut self, resp: Response, tuple: TransportTuple) {
        let Some(fingerprint) = sip_core::response_fingerprint(&resp) else {
            self.stats.record_unmatched_response();
            return;
        };

        let Some(txn) = self.client_txns.get(&fingerprint) else {
            self.stats.record_unmatched_response();
            return;
        };

        if txn.is_invite {
            self.handle_invite_client_response(fingerprint, resp, tuple).await;
        } else {
            self.handle_non_invite_client_response(fingerprint, resp, tuple).await;
        }
    }

    async fn handle_invite_client_response(
        &mut self,
        fingerprint: Fingerprint,
        resp: Response,
        tuple: TransportTuple,
    ) {
        let key = TransactionKey::client(fingerprint.clone());

        // A 2xx after the transaction already terminated still gets
        // forwarded, unconditionally, per §9's confirmed open question —
        // this is the forked-2xx case and every branch is independent.
        let already_terminated = self
            .client_txns
            .get(&fingerprint)
            .map(|t| t.state == ClientState::Terminated)
            .unwrap_or(true);

        if already_terminated {
            if resp.is_success() {
                let _ = self
                    .tu_tx
                    .send(TuEvent::OnResponse {
                        response: resp,
                        client_transaction_id: key,
                    })
                    .await;
            }
            return;
        }

        let Some(mut txn) = self.client_txns.remove(&fingerprint) else {
            return;
        };

        match txn.state {
            ClientState::Calling | ClientState::Proceeding => {
                if resp.is_provisional() {
                    if let Some(handle) = txn.timers.remove(&TimerKind::A) {
                        self.timers.cancel(handle);
                    }
                    txn.state = ClientState::Proceeding;
                    let _ = self
                        .tu_tx
                        .send(TuEvent::OnResponse {
                            response: resp,
                            client_transaction_id: key,
                        })
                        .await;
                    self.client_txns.insert(fingerprint, txn);
                } else if resp.is_success() {
                    for (_, handle) in txn.timers.drain() {
                        self.timers.cancel(handle);
                    }
                    txn.state = ClientState::Terminated;
                    txn.sent_2xx_to_tu = true;
                    let _ = self
                        .tu_tx
                        .send(TuEvent::OnResponse {
                            response: resp,
                            client_transaction_id: key,
                        })
                        .await;
                    // Retained (not removed) so later forked/retransmitted
                    // 2xx responses still match and forward (§3 invariant).
                    // Reaped explicitly by `TuCommand::EndClientTransaction`.
                    self.client_txns.insert(fingerprint, txn);
                } else {
                    for (_, handle) in txn.timers.drain() {
                        self.timers.cancel(handle);
                    }
                    let ack = build_ack(&txn.request, &resp);
                    let _ = self
                        .transport
                        .send_to(tuple.protocol, tuple.peer, &Message::Request(ack))
                        .await;
                    txn.state = ClientState::Completed;
                    let epoch = txn.bump_epoch();
                    let handle = self.timers.schedule(
                        self.settings.wait_for_ack_retransmits(txn.reliable_transport),
                        key.clone(),
                        TimerKind::D,
                        epoch,
                    );
                    txn.timers.insert(TimerKind::D, handle);
                    let _ = self
                        .tu_tx
                        .send(TuEvent::OnResponse {
                            response: resp,
                            client_transaction_id: key,
                        })
                        .await;
                    self.client_txns.insert(fingerprint, txn);
                }
            }
            ClientState::Completed => {
                if !resp.is_provisional() && !resp.is_success() {
                    let ack = build_ack(&txn.request, &resp);
                    let _ = self
                        .transport
                        .send_to(tuple.protocol, tuple.peer, &Message::Request(ack))
                        .await;
                }
                self.client_txns.insert(fingerprint, txn);
            }
            _ => {
                self.client_txns.insert(fingerprint, txn);
            }
        }
    }

    async fn handle_non_invite_client_response(
        &mut self,
        fingerprint: Fingerprint,
        resp: Response,
        _tuple: TransportTuple,
    ) {
        let key = TransactionKey::client(fingerprint.clone());
        let Some(mut txn) = self.client_txns.remove(&fingerprint) else {
            return;
        };

        match txn.state {
            ClientState::Trying | ClientState::Proceeding => {
                if resp.is_provisional() {
                    txn.state = ClientState::Proceeding;
                    let _ = self
                        .tu_tx
                        .send(TuEvent::OnResponse {
                            response: resp,
                            client_transaction_id: key,
                        })
                        .await;
                } else {
                    if let Some(handle) = txn.timers.remove(&TimerKind::E) {
                        self.timers.cancel(handle);
                    }
                    if let Some(handle) = txn.timers.remove(&TimerKind::F) {
                        self.timers.cancel(handle);
                    }
                    txn.state = ClientState::Completed;
                    let epoch = txn.bump_epoch();
                    let handle = self.timers.schedule(
                        self.settings.duplicate_absorption(txn.reliable_transport),
                        key.clone(),
                        TimerKind::K,
                        epoch,
                    );
                    txn.timers.insert(TimerKind::K, handle);
                    let _ = self
                        .tu_tx
                        .send(TuEvent::OnResponse {
                            response: resp,
                            client_transaction_id: key,
                        })
                        .await;
                }
                self.client_txns.insert(fingerprint, txn);
            }
            _ => {
                self.client_txns.insert(fingerprint, txn);
            }
        }
    }

    // ---- timers --------------------------------------------------------------

    async fn handle_timer_firing(&mut self, firing: crate::timer::TimerFiring) {
        let fingerprint = firing.key.fingerprint().clone();
        if firing.key.is_client() {
            self.handle_client_timer(fingerprint, firing.kind, firing.epoch).await;
        } else {
            self.handle_server_timer(fingerprint, firing.kind, firing.epoch).await;
        }
    }

    async fn handle_client_timer(&mut self, fingerprint: Fingerprint, kind: TimerKind, epoch: u64) {
        let Some(mut txn) = self.client_txns.remove(&fingerprint) else {
            return;
        };
        if txn.epoch != epoch {
            // Stale firing racing a state change; drop it (§5 "Cancellation").
            self.client_txns.insert(fingerprint, txn);
            return;
        }

        let key = TransactionKey::client(fingerprint.clone());

        match kind {
            TimerKind::A => {
                let _ = self
                    .transport
                    .send_to(
                        txn.protocol,
                        txn.peer,
                        &Message::Request(txn.request.clone()),
                    )
                    .await;
                txn.retransmit_interval *= 2;
                let epoch = txn.bump_epoch();
                let handle = self.timers.schedule(txn.retransmit_interval, key, TimerKind::A, epoch);
                txn.timers.insert(TimerKind::A, handle);
                self.client_txns.insert(fingerprint, txn);
            }
            TimerKind::E => {
                let _ = self
                    .transport
                    .send_to(
                        txn.protocol,
                        txn.peer,
                        &Message::Request(txn.request.clone()),
                    )
                    .await;
                txn.retransmit_interval = (txn.retransmit_interval * 2).min(self.settings.t2);
                let epoch = txn.bump_epoch();
                let handle = self.timers.schedule(txn.retransmit_interval, key, TimerKind::E, epoch);
                txn.timers.insert(TimerKind::E, handle);
                self.client_txns.insert(fingerprint, txn);
            }
            TimerKind::B | TimerKind::F => {
                for (_, handle) in txn.timers.drain() {
                    self.timers.cancel(handle);
                }
                txn.state = ClientState::Terminated;
                let _ = self
                    .tu_tx
                    .send(TuEvent::OnTransportFailure {
                        transaction_id: key.clone(),
                        cause: "transaction timed out".to_string(),
                    })
                    .await;
                let _ = self
                    .tu_tx
                    .send(TuEvent::OnTransactionTerminated { transaction_id: key })
                    .await;
                // not reinserted: fully destroyed.
            }
            TimerKind::D => {
                txn.state = ClientState::Terminated;
                let _ = self
                    .tu_tx
                    .send(TuEvent::OnTransactionTerminated { transaction_id: key })
                    .await;
            }
            TimerKind::K => {
                txn.state = ClientState::Terminated;
                let _ = self
                    .tu_tx
                    .send(TuEvent::OnTransactionTerminated { transaction_id: key })
                    .await;
            }
            _ => {
                self.client_txns.insert(fingerprint, txn);
            }
        }
    }

    async fn handle_server_timer(&mut self, fingerprint: Fingerprint, kind: TimerKind, epoch: u64) {
        let Some(mut txn) = self.server_txns.remove(&fingerprint) else {
            return;
        };
        if txn.epoch != epoch {
            self.server_txns.insert(fingerprint, txn);
            return;
        }

        let key = TransactionKey::server(fingerprint.clone());

        match kind {
            TimerKind::G => {
                if let Some(response) = txn.last_final_response.clone() {
                    let _ = self
                        .transport
                        .send_to(txn.protocol, txn.peer, &Message::Response(response))
                        .await;
                }
                txn.retransmit_interval = (txn.retransmit_interval * 2).min(self.settings.t2);
                let epoch = txn.bump_epoch();
                let handle = self.timers.schedule(txn.retransmit_interval, key, TimerKind::G, epoch);
                txn.timers.insert(TimerKind::G, handle);
                self.server_txns.insert(fingerprint, txn);
            }
            TimerKind::H | TimerKind::J | TimerKind::I => {
                for (_, handle) in txn.timers.drain() {
                    self.timers.cancel(handle);
                }
                txn.state = ServerState::Terminated;
                let _ = self
                    .tu_tx
                    .send(TuEvent::OnTransactionTerminated { transaction_id: key })
                    .await;
                // not reinserted: fully destroyed.
            }
            _ => {
                self.server_txns.insert(fingerprint, txn);
            }
        }
    }

    // ---- TU commands -----------------------------------------------------

    async fn handle_tu_command(&mut self, cmd: TuCommand) {
        match cmd {
            TuCommand::Send { request, destination } => {
                if let Err(e) = self.start_client_transaction(request, destination).await {
                    warn!(error = %e, "failed to start client transaction");
                }
            }
            TuCommand::Respond {
                server_transaction_id,
                response,
            } => {
                self.respond_from_tu(server_transaction_id, response).await;
            }
            TuCommand::EndClientTransaction { transaction_id } => {
                let fingerprint = transaction_id.fingerprint().clone();
                if let Some(mut txn) = self.client_txns.remove(&fingerprint) {
                    for (_, handle) in txn.timers.drain() {
                        self.timers.cancel(handle);
                    }
                    txn.state = ClientState::Terminated;
                    let _ = self
                        .tu_tx
                        .send(TuEvent::OnTransactionTerminated {
                            transaction_id: TransactionKey::client(fingerprint),
                        })
                        .await;
                }
            }
        }
    }

    async fn start_client_transaction(&mut self, request: Request, destination: Uri) -> Result<()> {
        if matches!(request.method, Method::Ack) {
            return Err(Error::InvalidInitialRequest(Method::Ack));
        }
        let is_invite = request.method == Method::Invite;
        let (protocol, peer) = self.transport.resolve(&destination).await?;
        let reliable = protocol.is_stream();

        self.transport
            .send_to(protocol, peer, &Message::Request(request.clone()))
            .await?;

        let fingerprint = sip_core::request_fingerprint(&request)
            .ok_or(Error::MissingHeader("Via"))?;
        let key = TransactionKey::client(fingerprint.clone());
        let mut txn = ClientTransaction::new(request, peer, protocol, is_invite);

        if is_invite {
            let epoch = txn.bump_epoch();
            if !reliable {
                // Timer A (§17.1.1.2): retransmission only applies to
                // unreliable transports.
                let a = self.timers.schedule(self.settings.t1, key.clone(), TimerKind::A, epoch);
                txn.timers.insert(TimerKind::A, a);
            }
            let b = self
                .timers
                .schedule(self.settings.transaction_timeout(), key, TimerKind::B, epoch);
            txn.timers.insert(TimerKind::B, b);
        } else {
            let epoch = txn.bump_epoch();
            if !reliable {
                // Timer E (§17.1.2.2): same restriction as Timer A.
                let e = self.timers.schedule(self.settings.t1, key.clone(), TimerKind::E, epoch);
                txn.timers.insert(TimerKind::E, e);
            }
            let f = self
                .timers
                .schedule(self.settings.transaction_timeout(), key, TimerKind::F, epoch);
            txn.timers.insert(TimerKind::F, f);
        }

        self.client_txns.insert(fingerprint, txn);
        Ok(())
    }

    async fn respond_from_tu(&mut self, server_transaction_id: TransactionKey, response: Response) {
        let fingerprint = server_transaction_id.fingerprint().clone();
        if response.is_provisional() {
            self.send_server_provisional(fingerprint, response).await;
        } else {
            self.send_server_final(fingerprint, response).await;
        }
    }

    async fn send_server_provisional(&mut self, fingerprint: Fingerprint, response: Response) {
        let Some(txn) = self.server_txns.get_mut(&fingerprint) else {
            return;
        };
        let _ = self
            .transport
            .send_to(
                txn.protocol,
                txn.peer,
                &Message::Response(response.clone()),
            )
            .await;
        txn.last_provisional_response = Some(response);
        if txn.state == ServerState::Trying {
            txn.state = ServerState::Proceeding;
        }
    }

    async fn send_server_final(&mut self, fingerprint: Fingerprint, response: Response) {
        let Some(mut txn) = self.server_txns.remove(&fingerprint) else {
            return;
        };
        let key = TransactionKey::server(fingerprint.clone());

        let _ = self
            .transport
            .send_to(
                txn.protocol,
                txn.peer,
                &Message::Response(response.clone()),
            )
            .await;
        txn.last_final_response = Some(response.clone());
        txn.sent_final_status = Some(response.status);

        if txn.is_invite {
            if response.is_success() {
                // §4.5: any 2xx sent takes an INVITE server transaction
                // directly to Terminated; the TU/dialog layer owns 2xx
                // retransmission from here.
                txn.state = ServerState::Terminated;
                let _ = self
                    .tu_tx
                    .send(TuEvent::OnTransactionTerminated { transaction_id: key })
                    .await;
            } else {
                txn.state = ServerState::Completed;
                let epoch = txn.bump_epoch();
                if !txn.reliable_transport {
                    // Timer G (§17.2.1): final-response retransmission only
                    // applies to unreliable transports.
                    let g = self.timers.schedule(
                        self.settings.t1,
                        key.clone(),
                        TimerKind::G,
                        epoch,
                    );
                    txn.timers.insert(TimerKind::G, g);
                }
                let h = self
                    .timers
                    .schedule(self.settings.ack_wait(), key, TimerKind::H, epoch);
                txn.timers.insert(TimerKind::H, h);
                self.server_txns.insert(fingerprint, txn);
            }
        } else {
            txn.state = ServerState::Completed;
            let epoch = txn.bump_epoch();
            let j = self.timers.schedule(
                self.settings.duplicate_absorption(txn.reliable_transport),
                key,
                TimerKind::J,
                epoch,
            );
            txn.timers.insert(TimerKind::J, j);
            self.server_txns.insert(fingerprint, txn);
        }
    }
}

/// Builds the ACK a client transaction sends automatically for a non-2xx
/// final response (§4.5's INVITE client table). Copies Call-ID, To (with
/// whatever tag the response carries), From, CSeq (sequence number only —
/// the method becomes ACK), and the top Via with the same branch.
fn build_ack(original: &Request, final_response: &Response) -> Request {
    let mut builder = RequestBuilder::new(Method::Ack, &original.uri.to_string())
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
    let to_tag = final_response.to().and_then(|t| t.tag());
    if let Some(to) = original.to() {
        builder = builder.to(to.display_name.as_deref().unwrap_or(""), &to.uri.to_string(), to_tag);
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
