//! Error types for message framing, parsing, and encoding.

use thiserror::Error;

/// Result alias used throughout `sip-core`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while framing, parsing, or encoding a SIP message.
///
/// Every variant here corresponds to a `ParseError` cause in the core error
/// taxonomy: recovered locally by the caller (bytes dropped, connection closed,
/// counter incremented) and never surfaced to the transaction user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The start line was not a well-formed request or status line.
    #[error("malformed start line: {0}")]
    MalformedStartLine(String),

    /// A header line had no `:` separator.
    #[error("malformed header line: {0}")]
    MalformedHeader(String),

    /// The header block was not terminated by a blank line.
    #[error("headers not terminated by CRLFCRLF")]
    UnterminatedHeaders,

    /// A chunk exceeded the configured maximum message size.
    #[error("message of {actual} bytes exceeds the {limit} byte limit")]
    MessageTooLarge { actual: usize, limit: usize },

    /// `Content-Length` did not match the bytes actually available.
    #[error("content-length mismatch: header said {expected}, body has {actual}")]
    ContentLengthMismatch { expected: usize, actual: usize },

    /// A header's typed grammar failed to parse on first access.
    #[error("failed to parse {header} header: {reason}")]
    HeaderGrammar { header: String, reason: String },

    /// A URI failed to parse.
    #[error("invalid SIP URI: {0}")]
    InvalidUri(String),

    /// An unknown or malformed SIP method token.
    #[error("invalid method token: {0}")]
    InvalidMethod(String),

    /// A status code outside the 100-699 range.
    #[error("invalid status code: {0}")]
    InvalidStatusCode(u16),

    /// A required header was absent from a message the parser must otherwise
    /// accept syntactically (Via, From, Call-ID, CSeq, Max-Forwards).
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::HeaderGrammar {
            header: "?".into(),
            reason: err.to_string(),
        }
    }
}
