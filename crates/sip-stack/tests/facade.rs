//! Smoke tests for the `SipStack` facade: the same round trips
//! `sip-transaction`'s scenario tests exercise against a raw `Dispatcher`,
//! here driven through the public facade an embedding application actually
//! links against.

use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use sip_core::prelude::*;
use sip_stack::{cancel_request, StackConfig, TuEvent};
use sip_transport::Protocol;

const WAIT: Duration = Duration::from_secs(5);

async fn recv_event(events: &mut tokio::sync::mpsc::Receiver<TuEvent>) -> TuEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for a TU event")
        .expect("TU channel closed unexpectedly")
}

#[tokio::test]
async fn options_round_trip_through_the_facade() {
    let config = StackConfig::new(Protocol::Udp, "127.0.0.1:0".parse().unwrap());
    let (stack, mut events) = sip_stack::SipStack::start(config).await.unwrap();

    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let peer_port = peer.local_addr().unwrap().port();

    let request = stack
        .new_request(Method::Options, &format!("sip:alice@127.0.0.1:{peer_port}"))
        .unwrap()
        .from("Bob", "sip:bob@127.0.0.1", Some("bobtag"))
        .to("Alice", "sip:alice@127.0.0.1", None)
        .call_id("facade-call@test")
        .cseq(1)
        .via("127.0.0.1", "UDP", Some(&sip_core::ids::new_branch()))
        .build();

    assert_eq!(request.max_forwards(), Some(70));
    assert!(request.headers.first(&HeaderName::UserAgent).is_some());

    let destination: Uri = format!("sip:alice@127.0.0.1:{peer_port}").parse().unwrap();
    stack.send(request, destination).await.unwrap();

    let mut buf = vec![0u8; 4096];
    let (n, from) = timeout(WAIT, peer.recv_from(&mut buf)).await.unwrap().unwrap();
    let inbound = parse_message(&buf[..n]).unwrap();
    let inbound = inbound.as_request().unwrap();
    assert_eq!(inbound.method, Method::Options);

    let response = ResponseBuilder::for_request(StatusCode::OK, None, inbound).build();
    peer.send_to(&response.to_bytes(), from).await.unwrap();

    match recv_event(&mut events).await {
        TuEvent::OnResponse { response, .. } => assert_eq!(response.status, StatusCode::OK),
        other => panic!("expected OnResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn inbound_invite_can_be_accepted_and_then_cancelled() {
    let config = StackConfig::new(Protocol::Udp, "127.0.0.1:0".parse().unwrap());
    let (stack, mut events) = sip_stack::SipStack::start(config).await.unwrap();
    let local = stack.transport().local_addr(Protocol::Udp).await.unwrap();

    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let invite = RequestBuilder::new(Method::Invite, &format!("sip:alice@127.0.0.1:{}", local.port()))
        .unwrap()
        .from("Bob", "sip:bob@127.0.0.1", Some("bobtag"))
        .to("Alice", "sip:alice@127.0.0.1", None)
        .call_id("facade-invite@test")
        .cseq(1)
        .via("127.0.0.1", "UDP", Some("z9hG4bK-facade"))
        .max_forwards(70)
        .build();
    peer.send_to(&invite.to_bytes(), local).await.unwrap();

    let (request, server_transaction_id) = match recv_event(&mut events).await {
        TuEvent::OnRequest { request, server_transaction_id } => (request, server_transaction_id),
        other => panic!("expected OnRequest, got {other:?}"),
    };

    let ringing = ResponseBuilder::for_request(StatusCode::RINGING, None, &request)
        .to_tag("alicetag")
        .build();
    stack.respond(server_transaction_id, ringing).await.unwrap();

    let mut buf = vec![0u8; 4096];
    let (n, _) = timeout(WAIT, peer.recv_from(&mut buf)).await.unwrap().unwrap();
    let provisional = parse_message(&buf[..n]).unwrap();
    assert_eq!(provisional.as_response().unwrap().status, StatusCode::RINGING);

    // The facade's cancel() helper builds a CANCEL from the original
    // request; sanity check it carries the same branch an actual CANCEL
    // would need to reach this same server transaction.
    let built_cancel = cancel_request(&request);
    assert_eq!(built_cancel.top_via().unwrap().branch(), request.top_via().unwrap().branch());
    assert_eq!(built_cancel.method, Method::Cancel);
}
