//! Wire Codec, encode side (§4.1): serializes a [`Request`]/[`Response`] into
//! its canonical on-wire byte form.

use bytes::{BufMut, Bytes, BytesMut};

use crate::types::header_name::HeaderName;
use crate::types::message::{Request, Response};

/// Write every header in insertion order, one line per value, then
/// `Content-Length` computed from `body` — regardless of what the caller put
/// in a `Content-Length` header of their own, per §4.1.
fn encode_headers(buf: &mut BytesMut, headers: &crate::types::header::HeaderList, body: &[u8]) {
    let mut wrote_content_length = false;
    for h in headers.iter() {
        if *h.name() == HeaderName::ContentLength {
            buf.put_slice(b"Content-Length: ");
            buf.put_slice(body.len().to_string().as_bytes());
            buf.put_slice(b"\r\n");
            wrote_content_length = true;
            continue;
        }
        buf.put_slice(h.name().canonical().as_bytes());
        buf.put_slice(b": ");
        buf.put_slice(h.raw().as_bytes());
        buf.put_slice(b"\r\n");
    }
    if !wrote_content_length {
        buf.put_slice(b"Content-Length: ");
        buf.put_slice(body.len().to_string().as_bytes());
        buf.put_slice(b"\r\n");
    }
}

pub fn encode_request(req: &Request) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_slice(req.method.as_str().as_bytes());
    buf.put_slice(b" ");
    buf.put_slice(req.uri.to_string().as_bytes());
    buf.put_slice(b" SIP/2.0\r\n");
    encode_headers(&mut buf, &req.headers, &req.body);
    buf.put_slice(b"\r\n");
    buf.put_slice(&req.body);
    buf.freeze()
}

pub fn encode_response(resp: &Response) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_slice(b"SIP/2.0 ");
    buf.put_slice(resp.status.to_string().as_bytes());
    buf.put_slice(b" ");
    buf.put_slice(resp.reason.as_bytes());
    buf.put_slice(b"\r\n");
    encode_headers(&mut buf, &resp.headers, &resp.body);
    buf.put_slice(b"\r\n");
    buf.put_slice(&resp.body);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_message;
    use crate::types::message::RequestBuilder;
    use crate::types::method::Method;

    #[test]
    fn encode_always_emits_content_length() {
        let req = RequestBuilder::new(Method::Options, "sip:bob@biloxi.com")
            .unwrap()
            .from("Alice", "sip:alice@atlanta.com", Some("1928301774"))
            .to("Bob", "sip:bob@biloxi.com", None)
            .call_id("abc@pc33")
            .cseq(1)
            .via("pc33.atlanta.com", "UDP", Some("z9hG4bK1"))
            .max_forwards(70)
            .build();
        let bytes = encode_request(&req);
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("Content-Length: 0\r\n"));
        assert!(text.starts_with("OPTIONS sip:bob@biloxi.com SIP/2.0\r\n"));
    }

    #[test]
    fn round_trip_encode_then_parse() {
        let req = RequestBuilder::new(Method::Invite, "sip:bob@biloxi.com")
            .unwrap()
            .from("Alice", "sip:alice@atlanta.com", Some("1928301774"))
            .to("Bob", "sip:bob@biloxi.com", None)
            .call_id("abc@pc33")
            .cseq(1)
            .via("pc33.atlanta.com", "UDP", Some("z9hG4bK1"))
            .max_forwards(70)
            .body(Bytes::from_static(b"v=0"), Some("application/sdp"))
            .build();
        let bytes = encode_request(&req);
        let parsed = parse_message(&bytes).unwrap();
        let parsed_req = parsed.as_request().unwrap();
        assert_eq!(parsed_req.method, req.method);
        assert_eq!(parsed_req.call_id(), req.call_id());
        assert_eq!(parsed_req.body, req.body);
    }
}
