//! End-to-end scenario tests (literal scenarios S1-S6): a live Dispatcher
//! talking over real loopback sockets to a hand-scripted peer that plays
//! the far side of the conversation. Timer settings are scaled down so the
//! whole suite runs in real wall-clock time without needing a paused
//! tokio clock (which doesn't mix well with real socket I/O).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::timeout;

use sip_core::prelude::*;
use sip_transaction::{Dispatcher, TimerSettings, TuCommand, TuEvent};
use sip_transport::{ListenerSpec, Protocol, TransportManager, TransportManagerConfig};

const WAIT: Duration = Duration::from_secs(5);

fn fast_timers() -> TimerSettings {
    TimerSettings {
        t1: Duration::from_millis(40),
        t2: Duration::from_millis(320),
        t4: Duration::from_millis(160),
    }
}

async fn start_dispatcher(
    protocol: Protocol,
    settings: TimerSettings,
) -> (
    Arc<TransportManager>,
    SocketAddr,
    mpsc::Sender<TuCommand>,
    mpsc::Receiver<TuEvent>,
) {
    let config = TransportManagerConfig {
        listeners: vec![ListenerSpec {
            protocol,
            addr: "127.0.0.1:0".parse().unwrap(),
        }],
        ..Default::default()
    };
    let (transport, events_rx) = TransportManager::start(config).await.unwrap();
    let local = transport.local_addr(protocol).await.unwrap();
    let (dispatcher, tu_tx, tu_rx) = Dispatcher::new(transport.clone(), events_rx, settings);
    tokio::spawn(dispatcher.run());
    (transport, local, tu_tx, tu_rx)
}

async fn recv_tu_event(rx: &mut mpsc::Receiver<TuEvent>) -> TuEvent {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a TU event")
        .expect("TU channel closed unexpectedly")
}

fn sample_options_request(target_port: u16) -> Request {
    RequestBuilder::new(Method::Options, &format!("sip:alice@127.0.0.1:{target_port}"))
        .unwrap()
        .from("Bob", "sip:bob@127.0.0.1", Some("bobtag"))
        .to("Alice", "sip:alice@127.0.0.1", None)
        .call_id("s1-call@test")
        .cseq(1)
        .via("127.0.0.1", "UDP", Some("z9hG4bK-s1"))
        .max_forwards(70)
        .build()
}

fn sample_invite_request(target_port: u16, branch: &str) -> Request {
    RequestBuilder::new(Method::Invite, &format!("sip:alice@127.0.0.1:{target_port}"))
        .unwrap()
        .from("Bob", "sip:bob@127.0.0.1", Some("bobtag"))
        .to("Alice", "sip:alice@127.0.0.1", None)
        .call_id("invite-call@test")
        .cseq(1)
        .via("127.0.0.1", "UDP", Some(branch))
        .max_forwards(70)
        .build()
}

// S1 — non-INVITE client over UDP with a lossy peer: two dropped
// retransmissions, then a 200 on the third try, then eventual termination.
#[tokio::test]
async fn s1_non_invite_client_survives_lossy_peer() {
    let (_transport, _local, tu_tx, mut tu_rx) = start_dispatcher(Protocol::Udp, fast_timers()).await;
    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let peer_port = peer.local_addr().unwrap().port();

    let request = sample_options_request(peer_port);
    let destination: Uri = format!("sip:alice@127.0.0.1:{peer_port}").parse().unwrap();
    tu_tx
        .send(TuCommand::Send {
            request,
            destination,
        })
        .await
        .unwrap();

    let mut buf = vec![0u8; 4096];
    // First two arrivals (the original send and the Timer A retransmit) are dropped.
    for _ in 0..2 {
        let (n, _from) = timeout(WAIT, peer.recv_from(&mut buf)).await.unwrap().unwrap();
        assert!(n > 0);
    }
    let (n, from) = timeout(WAIT, peer.recv_from(&mut buf)).await.unwrap().unwrap();
    let request = parse_message(&buf[..n]).unwrap();
    let request = request.as_request().unwrap();
    let response = ResponseBuilder::for_request(StatusCode::OK, None, request).build();
    peer.send_to(&response.to_bytes(), from).await.unwrap();

    match recv_tu_event(&mut tu_rx).await {
        TuEvent::OnResponse { response, .. } => assert_eq!(response.status, StatusCode::OK),
        other => panic!("expected OnResponse, got {other:?}"),
    }
    match recv_tu_event(&mut tu_rx).await {
        TuEvent::OnTransactionTerminated { .. } => {}
        other => panic!("expected OnTransactionTerminated, got {other:?}"),
    }
}

// S2 — INVITE client receives 180 then 200: exactly one of each reaches
// the TU and retransmissions stop once the provisional arrives.
#[tokio::test]
async fn s2_invite_client_sees_one_provisional_then_one_success() {
    let (_transport, _local, tu_tx, mut tu_rx) = start_dispatcher(Protocol::Udp, fast_timers()).await;
    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let peer_port = peer.local_addr().unwrap().port();

    let request = sample_invite_request(peer_port, "z9hG4bK-s2");
    let destination: Uri = format!("sip:alice@127.0.0.1:{peer_port}").parse().unwrap();
    tu_tx
        .send(TuCommand::Send {
            request,
            destination,
        })
        .await
        .unwrap();

    let mut buf = vec![0u8; 4096];
    let (n, from) = timeout(WAIT, peer.recv_from(&mut buf)).await.unwrap().unwrap();
    let invite = parse_message(&buf[..n]).unwrap();
    let invite = invite.as_request().unwrap();

    let ringing = ResponseBuilder::for_request(StatusCode::RINGING, None, invite)
        .to_tag("alicetag")
        .build();
    peer.send_to(&ringing.to_bytes(), from).await.unwrap();

    match recv_tu_event(&mut tu_rx).await {
        TuEvent::OnResponse { response, .. } => assert_eq!(response.status, StatusCode::RINGING),
        other => panic!("expected OnResponse(180), got {other:?}"),
    }

    let ok = ResponseBuilder::for_request(StatusCode::OK, None, invite)
        .to_tag("alicetag")
        .build();
    peer.send_to(&ok.to_bytes(), from).await.unwrap();

    match recv_tu_event(&mut tu_rx).await {
        TuEvent::OnResponse { response, .. } => assert_eq!(response.status, StatusCode::OK),
        other => panic!("expected OnResponse(200), got {other:?}"),
    }

    // No further retransmission of the INVITE should arrive now that a
    // provisional silenced Timer A.
    let extra = timeout(Duration::from_millis(300), peer.recv_from(&mut buf)).await;
    assert!(extra.is_err(), "unexpected extra datagram from the client");
}

// S3 — INVITE client gets a 486 and auto-generates the ACK; a retransmitted
// 486 produces another ACK but no second TU event.
#[tokio::test]
async fn s3_invite_client_acks_non_2xx_final_and_absorbs_retransmit() {
    let (_transport, _local, tu_tx, mut tu_rx) = start_dispatcher(Protocol::Udp, fast_timers()).await;
    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let peer_port = peer.local_addr().unwrap().port();

    let request = sample_invite_request(peer_port, "z9hG4bK-s3");
    let destination: Uri = format!("sip:alice@127.0.0.1:{peer_port}").parse().unwrap();
    tu_tx
        .send(TuCommand::Send {
            request,
            destination,
        })
        .await
        .unwrap();

    let mut buf = vec![0u8; 4096];
    let (n, from) = timeout(WAIT, peer.recv_from(&mut buf)).await.unwrap().unwrap();
    let invite = parse_message(&buf[..n]).unwrap();
    let invite = invite.as_request().unwrap();

    let busy = ResponseBuilder::for_request(StatusCode::BUSY_HERE, None, invite)
        .to_tag("alicetag")
        .build();
    peer.send_to(&busy.to_bytes(), from).await.unwrap();

    match recv_tu_event(&mut tu_rx).await {
        TuEvent::OnResponse { response, .. } => assert_eq!(response.status, StatusCode::BUSY_HERE),
        other => panic!("expected OnResponse(486), got {other:?}"),
    }

    let (n, _) = timeout(WAIT, peer.recv_from(&mut buf)).await.unwrap().unwrap();
    let ack = parse_message(&buf[..n]).unwrap();
    assert_eq!(ack.as_request().unwrap().method, Method::Ack);

    // Retransmit the 486: the client must ACK it again, but the TU must not
    // see a second OnResponse for it.
    peer.send_to(&busy.to_bytes(), from).await.unwrap();
    let (n, _) = timeout(WAIT, peer.recv_from(&mut buf)).await.unwrap().unwrap();
    let ack_again = parse_message(&buf[..n]).unwrap();
    assert_eq!(ack_again.as_request().unwrap().method, Method::Ack);

    let extra = timeout(Duration::from_millis(200), tu_rx.recv()).await;
    assert!(extra.is_err(), "unexpected second TU event for the retransmitted 486");
}

// S4 — a CANCEL arriving for an INVITE server transaction in Proceeding:
// the CANCEL itself gets its own server transaction and a 200 from the TU,
// and the INVITE transaction is driven to send 487 automatically.
#[tokio::test]
async fn s4_cancel_drives_invite_server_transaction_to_487() {
    let (_transport, local, tu_tx, mut tu_rx) = start_dispatcher(Protocol::Udp, fast_timers()).await;
    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let invite = sample_invite_request(local.port(), "z9hG4bK-s4");
    peer.send_to(&invite.to_bytes(), local).await.unwrap();

    let invite_server_key = match recv_tu_event(&mut tu_rx).await {
        TuEvent::OnRequest {
            request,
            server_transaction_id,
        } => {
            assert_eq!(request.method, Method::Invite);
            server_transaction_id
        }
        other => panic!("expected OnRequest(INVITE), got {other:?}"),
    };

    let mut cancel = invite.clone();
    cancel.method = Method::Cancel;
    peer.send_to(&cancel.to_bytes(), local).await.unwrap();

    let (cancel_request, cancel_server_key) = match recv_tu_event(&mut tu_rx).await {
        TuEvent::OnRequest {
            request,
            server_transaction_id,
        } => {
            assert_eq!(request.method, Method::Cancel);
            (request, server_transaction_id)
        }
        other => panic!("expected OnRequest(CANCEL), got {other:?}"),
    };
    assert_ne!(cancel_server_key.to_string(), invite_server_key.to_string());

    let cancel_ok = ResponseBuilder::for_request(StatusCode::OK, None, &cancel_request)
        .to_tag("alicetag")
        .build();
    tu_tx
        .send(TuCommand::Respond {
            server_transaction_id: cancel_server_key,
            response: cancel_ok,
        })
        .await
        .unwrap();

    let mut buf = vec![0u8; 4096];
    let mut saw_200 = false;
    let mut saw_487 = false;
    for _ in 0..2 {
        let (n, _) = timeout(WAIT, peer.recv_from(&mut buf)).await.unwrap().unwrap();
        let response = parse_message(&buf[..n]).unwrap();
        let response = response.as_response().unwrap();
        match response.status {
            StatusCode::OK => saw_200 = true,
            StatusCode::REQUEST_TERMINATED => saw_487 = true,
            other => panic!("unexpected status {other}"),
        }
    }
    assert!(saw_200, "expected a 200 accepting the CANCEL");
    assert!(saw_487, "expected the INVITE server transaction to auto-send 487");
}

// S5 — a TCP connection resets while a non-INVITE client transaction is in
// Proceeding: the TU sees an OnTransportFailure, and the transaction is
// torn down on the next tick.
#[tokio::test]
async fn s5_tcp_reset_surfaces_transport_failure() {
    let (transport, _local, tu_tx, mut tu_rx) = start_dispatcher(Protocol::Tcp, fast_timers()).await;
    let peer_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let peer_port = peer_listener.local_addr().unwrap().port();

    let request = sample_options_request(peer_port);
    let destination: Uri = format!("sip:alice@127.0.0.1:{peer_port};transport=tcp")
        .parse()
        .unwrap();
    tu_tx
        .send(TuCommand::Send {
            request,
            destination,
        })
        .await
        .unwrap();

    let (mut stream, _) = timeout(WAIT, peer_listener.accept()).await.unwrap().unwrap();
    let mut buf = vec![0u8; 4096];
    let n = timeout(WAIT, tokio::io::AsyncReadExt::read(&mut stream, &mut buf))
        .await
        .unwrap()
        .unwrap();
    let request = parse_message(&buf[..n]).unwrap();
    let request = request.as_request().unwrap();

    let trying = ResponseBuilder::for_request(StatusCode::TRYING, None, request).build();
    tokio::io::AsyncWriteExt::write_all(&mut stream, &trying.to_bytes())
        .await
        .unwrap();

    // Reset: drop the stream without a final response.
    drop(stream);

    match recv_tu_event(&mut tu_rx).await {
        TuEvent::OnTransportFailure { .. } => {}
        other => panic!("expected OnTransportFailure, got {other:?}"),
    }
    match recv_tu_event(&mut tu_rx).await {
        TuEvent::OnTransactionTerminated { .. } => {}
        other => panic!("expected OnTransactionTerminated, got {other:?}"),
    }
    let _ = transport;
}

// S6 — RFC 2543 back-compat matching: a Via branch without the magic
// cookie still matches a retransmission to the same server transaction,
// and the retransmission never reaches the TU a second time.
#[tokio::test]
async fn s6_legacy_branch_retransmission_matches_same_transaction() {
    let (_transport, local, _tu_tx, mut tu_rx) = start_dispatcher(Protocol::Udp, fast_timers()).await;
    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let invite = RequestBuilder::new(Method::Invite, &format!("sip:alice@127.0.0.1:{}", local.port()))
        .unwrap()
        .from("Bob", "sip:bob@127.0.0.1", Some("bobtag"))
        .to("Alice", "sip:alice@127.0.0.1", None)
        .call_id("s6-call@test")
        .cseq(1)
        .via("127.0.0.1", "UDP", Some("987legacybranch"))
        .max_forwards(70)
        .build();

    peer.send_to(&invite.to_bytes(), local).await.unwrap();
    match recv_tu_event(&mut tu_rx).await {
        TuEvent::OnRequest { request, .. } => assert_eq!(request.method, Method::Invite),
        other => panic!("expected OnRequest(INVITE), got {other:?}"),
    }

    // Same fields, same (non-cookie) branch: the legacy MD5 fingerprint
    // matches the existing transaction, so no second OnRequest fires.
    peer.send_to(&invite.to_bytes(), local).await.unwrap();
    let extra = timeout(Duration::from_millis(300), tu_rx.recv()).await;
    assert!(extra.is_err(), "retransmission should not reach the TU twice");
}
