use std::time::Duration;

use sip_core::{Method, RequestBuilder};
use sip_transport::transport::{Transport, TransportEvent};
use sip_transport::udp::UdpTransport;

#[tokio::test]
async fn udp_transport_delivers_a_request_end_to_end() {
    let (server, mut server_events) =
        UdpTransport::bind("127.0.0.1:0".parse().unwrap(), 8192, None)
            .await
            .unwrap();
    let (client, _client_events) = UdpTransport::bind("127.0.0.1:0".parse().unwrap(), 8192, None)
        .await
        .unwrap();

    let server_addr = server.local_addr();

    let request = RequestBuilder::new(Method::Options, "sip:bob@biloxi.com")
        .unwrap()
        .from("Alice", "sip:alice@atlanta.com", Some("1928301774"))
        .to("Bob", "sip:bob@biloxi.com", None)
        .call_id("round-trip-test@atlanta.com")
        .cseq(1)
        .via("atlanta.com", "UDP", Some("z9hG4bK-roundtrip"))
        .max_forwards(70)
        .build();

    client.send(server_addr, &request).await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(2), server_events.recv())
        .await
        .expect("server should receive an event before the timeout")
        .expect("event channel should not close");

    match event {
        TransportEvent::MessageReceived { message, .. } => {
            let received = message.as_request().expect("should be a request");
            assert_eq!(received.method, Method::Options);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn udp_transport_absorbs_keepalive_without_an_event() {
    let (server, mut server_events) =
        UdpTransport::bind("127.0.0.1:0".parse().unwrap(), 8192, None)
            .await
            .unwrap();
    let (client, _client_events) = UdpTransport::bind("127.0.0.1:0".parse().unwrap(), 8192, None)
        .await
        .unwrap();

    let server_addr = server.local_addr();
    let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.send_to(b"\r\n\r\n", server_addr).await.unwrap();

    let result = tokio::time::timeout(Duration::from_millis(200), server_events.recv()).await;
    assert!(result.is_err(), "a bare keep-alive must not surface as an event");

    drop(client);
}
