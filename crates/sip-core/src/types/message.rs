//! Request, Response, and the `Message` sum type (§3).

use std::fmt;

use bytes::Bytes;

use crate::error::Error;
use crate::fingerprint::{self, Fingerprint};
use crate::types::address::Address;
use crate::types::header::{HeaderList, HeaderValue};
use crate::types::header_name::HeaderName;
use crate::types::method::Method;
use crate::types::status::StatusCode;
use crate::types::uri::Uri;
use crate::types::via::Via;

/// Where a message came from: off the wire, or built locally by the TU.
///
/// Replaces the source repository's `(Transport*)(0xFFFF)` sentinel (see
/// DESIGN.md / spec.md §9) with an explicit, matchable variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Network,
    Internal,
}

/// A parsed or constructed SIP request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderList,
    pub body: Bytes,
    pub origin: Origin,
}

/// A parsed or constructed SIP response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub reason: String,
    pub headers: HeaderList,
    pub body: Bytes,
    pub origin: Origin,
}

macro_rules! common_accessors {
    () => {
        pub fn via_headers(&self) -> Vec<&Via> {
            self.headers
                .all(&HeaderName::Via)
                .filter_map(|h| h.as_via().ok())
                .collect()
        }

        pub fn top_via(&self) -> Option<&Via> {
            self.headers.first(&HeaderName::Via)?.as_via().ok()
        }

        pub fn from(&self) -> Option<&Address> {
            self.headers.first(&HeaderName::From)?.as_address().ok()
        }

        pub fn to(&self) -> Option<&Address> {
            self.headers.first(&HeaderName::To)?.as_address().ok()
        }

        pub fn call_id(&self) -> Option<&str> {
            self.headers.first(&HeaderName::CallId).map(|h| h.raw())
        }

        pub fn cseq(&self) -> Option<(u32, Method)> {
            self.headers.first(&HeaderName::CSeq)?.as_cseq().ok()
        }

        pub fn content_length(&self) -> Option<u64> {
            self.headers
                .first(&HeaderName::ContentLength)
                .and_then(|h| h.as_uint().ok())
        }

        pub fn content_type(&self) -> Option<&str> {
            self.headers.first(&HeaderName::ContentType).map(|h| h.raw())
        }
    };
}

impl Request {
    common_accessors!();

    pub fn max_forwards(&self) -> Option<u64> {
        self.headers
            .first(&HeaderName::MaxForwards)
            .and_then(|h| h.as_uint().ok())
    }

    /// Every header §3 requires a well-formed request to carry before it may
    /// reach the TU: non-empty Via, From tag, Call-ID, CSeq, Max-Forwards.
    pub fn has_required_headers(&self) -> bool {
        self.top_via().is_some()
            && self.from().map(|f| f.tag().is_some()).unwrap_or(false)
            && self.call_id().is_some()
            && self.cseq().is_some()
            && self.max_forwards().is_some()
    }

    pub fn fingerprint(&self) -> Option<Fingerprint> {
        fingerprint::request_fingerprint(self)
    }

    pub fn to_bytes(&self) -> Bytes {
        crate::codec::encode_request(self)
    }
}

impl Response {
    common_accessors!();

    pub fn fingerprint(&self) -> Option<Fingerprint> {
        fingerprint::response_fingerprint(self)
    }

    pub fn to_bytes(&self) -> Bytes {
        crate::codec::encode_response(self)
    }

    pub fn is_provisional(&self) -> bool {
        self.status.is_provisional()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Either a request or a response — the unit the Wire Codec and Dispatcher
/// pass around.
#[derive(Debug, Clone)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Message::Request(r) => r.to_bytes(),
            Message::Response(r) => r.to_bytes(),
        }
    }

    pub fn fingerprint(&self) -> Option<Fingerprint> {
        match self {
            Message::Request(r) => r.fingerprint(),
            Message::Response(r) => r.fingerprint(),
        }
    }

    pub fn as_request(&self) -> Option<&Request> {
        match self {
            Message::Request(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_response(&self) -> Option<&Response> {
        match self {
            Message::Response(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Request(r) => write!(f, "{} {}", r.method, r.uri),
            Message::Response(r) => write!(f, "{} {}", r.status, r.reason),
        }
    }
}

/// Fluent builder for outbound requests, mirroring the teacher stack's
/// `RequestBuilder` (see DESIGN.md).
pub struct RequestBuilder {
    method: Method,
    uri: Uri,
    headers: HeaderList,
    body: Bytes,
}

impl RequestBuilder {
    pub fn new(method: Method, uri: &str) -> Result<Self, Error> {
        Ok(RequestBuilder {
            method,
            uri: uri.parse()?,
            headers: HeaderList::new(),
            body: Bytes::new(),
        })
    }

    pub fn via(mut self, host: &str, transport: &str, branch: Option<&str>) -> Self {
        let mut via = Via::new(transport, host, None);
        if let Some(b) = branch {
            via.set_branch(b);
        }
        self.headers
            .push(HeaderValue::new(HeaderName::Via, via.to_string()));
        self
    }

    pub fn from(mut self, display_name: &str, uri: &str, tag: Option<&str>) -> Self {
        self.headers.push(address_header(
            HeaderName::From,
            display_name,
            uri,
            tag,
        ));
        self
    }

    pub fn to(mut self, display_name: &str, uri: &str, tag: Option<&str>) -> Self {
        self.headers
            .push(address_header(HeaderName::To, display_name, uri, tag));
        self
    }

    pub fn contact(mut self, uri: &str) -> Self {
        self.headers.push(HeaderValue::new(
            HeaderName::Contact,
            format!("<{}>", uri),
        ));
        self
    }

    pub fn call_id(mut self, call_id: &str) -> Self {
        self.headers
            .push(HeaderValue::new(HeaderName::CallId, call_id.to_string()));
        self
    }

    pub fn cseq(mut self, seq: u32) -> Self {
        let method = self.method.clone();
        self.headers.push(HeaderValue::new(
            HeaderName::CSeq,
            format!("{} {}", seq, method),
        ));
        self
    }

    pub fn max_forwards(mut self, value: u32) -> Self {
        self.headers.push(HeaderValue::new(
            HeaderName::MaxForwards,
            value.to_string(),
        ));
        self
    }

    pub fn user_agent(mut self, value: &str) -> Self {
        self.headers
            .push(HeaderValue::new(HeaderName::UserAgent, value.to_string()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push(HeaderValue::new(name, value));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>, content_type: Option<&str>) -> Self {
        if let Some(ct) = content_type {
            self.headers
                .push(HeaderValue::new(HeaderName::ContentType, ct.to_string()));
        }
        self.body = body.into();
        self
    }

    /// Stamps Max-Forwards with the RFC default when the caller never set
    /// one. `sip-stack` overrides this by calling `.max_forwards()` with
    /// its configured value before `build()`.
    pub fn build(self) -> Request {
        let mut headers = self.headers;
        if headers.first(&HeaderName::MaxForwards).is_none() {
            headers.push(HeaderValue::new(
                HeaderName::MaxForwards,
                DEFAULT_MAX_FORWARDS.to_string(),
            ));
        }
        Request {
            method: self.method,
            uri: self.uri,
            headers,
            body: self.body,
            origin: Origin::Internal,
        }
    }
}

/// RFC 3261 §8.1.1's recommended starting value for Max-Forwards.
pub const DEFAULT_MAX_FORWARDS: u32 = 70;

/// Fluent builder for outbound responses.
pub struct ResponseBuilder {
    status: StatusCode,
    reason: String,
    headers: HeaderList,
    body: Bytes,
}

impl ResponseBuilder {
    pub fn new(status: StatusCode, reason: Option<&str>) -> Self {
        ResponseBuilder {
            reason: reason.unwrap_or_else(|| status.default_reason()).to_string(),
            status,
            headers: HeaderList::new(),
            body: Bytes::new(),
        }
    }

    /// Build a response that copies the dialog-identifying headers (Via
    /// stack, From, To, Call-ID, CSeq) from the request it answers, as every
    /// transaction-layer-generated response must.
    pub fn for_request(status: StatusCode, reason: Option<&str>, request: &Request) -> Self {
        let mut headers = HeaderList::new();
        for via in request.headers.all(&HeaderName::Via) {
            headers.push(via.clone());
        }
        if let Some(from) = request.headers.first(&HeaderName::From) {
            headers.push(from.clone());
        }
        if let Some(to) = request.headers.first(&HeaderName::To) {
            headers.push(to.clone());
        }
        if let Some(call_id) = request.headers.first(&HeaderName::CallId) {
            headers.push(call_id.clone());
        }
        if let Some(cseq) = request.headers.first(&HeaderName::CSeq) {
            headers.push(cseq.clone());
        }
        ResponseBuilder {
            reason: reason.unwrap_or_else(|| status.default_reason()).to_string(),
            status,
            headers,
            body: Bytes::new(),
        }
    }

    pub fn to_tag(mut self, tag: &str) -> Self {
        if let Some(to) = self.headers.first(&HeaderName::To) {
            if let Ok(addr) = to.as_address() {
                if addr.tag().is_none() {
                    let raw = to.raw().to_string();
                    self.headers.remove_all(&HeaderName::To);
                    self.headers
                        .push(HeaderValue::new(HeaderName::To, format!("{};tag={}", raw, tag)));
                }
            }
        }
        self
    }

    pub fn contact(mut self, uri: &str) -> Self {
        self.headers
            .push(HeaderValue::new(HeaderName::Contact, format!("<{}>", uri)));
        self
    }

    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push(HeaderValue::new(name, value));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>, content_type: Option<&str>) -> Self {
        if let Some(ct) = content_type {
            self.headers
                .push(HeaderValue::new(HeaderName::ContentType, ct.to_string()));
        }
        self.body = body.into();
        self
    }

    pub fn build(self) -> Response {
        Response {
            status: self.status,
            reason: self.reason,
            headers: self.headers,
            body: self.body,
            origin: Origin::Internal,
        }
    }
}

fn address_header(name: HeaderName, display_name: &str, uri: &str, tag: Option<&str>) -> HeaderValue {
    let mut raw = String::new();
    if !display_name.is_empty() {
        raw.push_str(&format!("\"{}\" ", display_name));
    }
    raw.push_str(&format!("<{}>", uri));
    if let Some(t) = tag {
        raw.push_str(&format!(";tag={}", t));
    }
    HeaderValue::new(name, raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_required_headers() {
        let req = RequestBuilder::new(Method::Invite, "sip:bob@biloxi.com")
            .unwrap()
            .from("Alice", "sip:alice@atlanta.com", Some("1928301774"))
            .to("Bob", "sip:bob@biloxi.com", None)
            .call_id("a84b4c76e66710@pc33.atlanta.com")
            .cseq(1)
            .via("pc33.atlanta.com", "UDP", Some("z9hG4bK776asdhds"))
            .max_forwards(70)
            .build();
        assert!(req.has_required_headers());
    }

    #[test]
    fn response_for_request_copies_dialog_headers() {
        let req = RequestBuilder::new(Method::Invite, "sip:bob@biloxi.com")
            .unwrap()
            .from("Alice", "sip:alice@atlanta.com", Some("1928301774"))
            .to("Bob", "sip:bob@biloxi.com", None)
            .call_id("a84b4c76e66710@pc33.atlanta.com")
            .cseq(1)
            .via("pc33.atlanta.com", "UDP", Some("z9hG4bK776asdhds"))
            .max_forwards(70)
            .build();
        let resp = ResponseBuilder::for_request(StatusCode::OK, None, &req)
            .to_tag("a6c85cf")
            .build();
        assert_eq!(resp.call_id(), req.call_id());
        assert_eq!(resp.to().unwrap().tag(), Some("a6c85cf"));
    }
}
