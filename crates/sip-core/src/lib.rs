//! # sip-core
//!
//! Message types, the RFC 3261 wire codec, and the lazy, forgiving-but-precise
//! SIP message parser. This crate has no knowledge of transports, timers, or
//! transaction state — it turns bytes into typed messages and back, and it
//! computes the transaction-matching fingerprint those messages carry.
//!
//! ## Getting started
//!
//! ```rust
//! use sip_core::prelude::*;
//!
//! let request = RequestBuilder::new(Method::Invite, "sip:bob@biloxi.com").unwrap()
//!     .from("Alice", "sip:alice@atlanta.com", Some("1928301774"))
//!     .to("Bob", "sip:bob@biloxi.com", None)
//!     .call_id("a84b4c76e66710@pc33.atlanta.com")
//!     .cseq(314159)
//!     .via("pc33.atlanta.com", "UDP", Some("z9hG4bK776asdhds"))
//!     .max_forwards(70)
//!     .build();
//!
//! let bytes = request.to_bytes();
//! let reparsed = parse_message(&bytes).unwrap();
//! assert_eq!(reparsed.as_request().unwrap().method, Method::Invite);
//! ```

pub mod codec;
pub mod error;
pub mod fingerprint;
pub mod ids;
pub mod parser;
pub mod types;

pub use error::{Error, Result};
pub use fingerprint::{invite_lookup_fingerprint, request_fingerprint, response_fingerprint, Fingerprint};
pub use parser::{find_header_terminator, parse_message, peek_content_length};
pub use types::{
    Address, HeaderList, HeaderName, HeaderValue, Message, Method, Origin, Param, ParamList,
    Request, RequestBuilder, Response, ResponseBuilder, Scheme, StatusCode, Uri, Via,
    DEFAULT_MAX_FORWARDS,
};

/// Commonly used re-exports for downstream crates and applications.
pub mod prelude {
    pub use crate::{
        invite_lookup_fingerprint, parse_message, request_fingerprint, response_fingerprint,
        Address, Error, Fingerprint, HeaderList, HeaderName, HeaderValue, Message, Method, Origin,
        Param, ParamList, Request, RequestBuilder, Response, ResponseBuilder, Result, Scheme,
        StatusCode, Uri, Via, DEFAULT_MAX_FORWARDS,
    };
}
