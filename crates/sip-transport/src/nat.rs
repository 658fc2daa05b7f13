//! `received`/`rport` stamping (RFC 3261 §18.2.1): before an inbound request
//! reaches the Transaction Layer, the Transport Manager compares the
//! transport tuple's actual peer address against the topmost Via's
//! `sent-by` host and annotates the header when they disagree, so the
//! response can find its way back through a NAT the client sits behind.

use sip_core::{HeaderName, HeaderValue, Message};

use crate::transport::TransportTuple;

/// Mutates `message`'s topmost Via in place if it is a request whose
/// `sent-by` host doesn't match the address it actually arrived from, or
/// whose Via carried a bare `rport` parameter asking for the echo.
/// Responses and requests with no Via are left untouched — the latter fail
/// `Request::has_required_headers` downstream as any other malformed
/// request would.
pub fn stamp_received_and_rport(message: &mut Message, tuple: &TransportTuple) {
    let request = match message {
        Message::Request(request) => request,
        Message::Response(_) => return,
    };

    let mut via = match request.top_via() {
        Some(via) => via.clone(),
        None => return,
    };

    let wants_rport = via.has_rport_request();
    let sent_by_matches = via.sent_host == tuple.peer.ip().to_string();

    if sent_by_matches && !wants_rport {
        return;
    }

    if !sent_by_matches {
        via.set_received(tuple.peer.ip().to_string());
    }
    if wants_rport {
        via.set_rport(tuple.peer.port());
    }

    request
        .headers
        .replace_first(&HeaderName::Via, HeaderValue::new(HeaderName::Via, via.to_string()));
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use sip_core::{HeaderName, HeaderValue, Method, RequestBuilder};

    use super::*;
    use crate::transport::Protocol;

    fn tuple(peer: &str) -> TransportTuple {
        TransportTuple {
            protocol: Protocol::Udp,
            local: "127.0.0.1:5060".parse().unwrap(),
            peer: peer.parse::<SocketAddr>().unwrap(),
        }
    }

    fn request_with_via(via_text: &str) -> Message {
        let mut request = RequestBuilder::new(Method::Options, "sip:bob@biloxi.com")
            .unwrap()
            .build();
        request
            .headers
            .push(HeaderValue::new(HeaderName::Via, via_text.to_string()));
        Message::Request(request)
    }

    #[test]
    fn stamps_received_when_sent_by_disagrees_with_the_peer() {
        let mut message =
            request_with_via("SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds");
        stamp_received_and_rport(&mut message, &tuple("192.0.2.4:9999"));

        let via = message.as_request().unwrap().top_via().unwrap();
        assert_eq!(via.received(), Some("192.0.2.4"));
        assert!(!via.params.has("rport"));
    }

    #[test]
    fn leaves_via_untouched_when_sent_by_already_matches_the_peer() {
        let mut message = request_with_via("SIP/2.0/UDP 192.0.2.4;branch=z9hG4bK776asdhds");
        stamp_received_and_rport(&mut message, &tuple("192.0.2.4:9999"));

        let via = message.as_request().unwrap().top_via().unwrap();
        assert_eq!(via.received(), None);
    }

    #[test]
    fn echoes_rport_when_the_request_asked_for_it() {
        let mut message =
            request_with_via("SIP/2.0/UDP 192.0.2.4;branch=z9hG4bK776asdhds;rport");
        stamp_received_and_rport(&mut message, &tuple("192.0.2.4:9999"));

        let via = message.as_request().unwrap().top_via().unwrap();
        assert_eq!(via.params.get("rport").flatten(), Some("9999"));
    }
}
