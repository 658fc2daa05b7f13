//! The two-pass message parser (§4.2).
//!
//! Pass 1 (this module) scans the byte buffer, locates the start line and
//! each header's name/value byte range, and classifies the message as
//! request or response. Failure here yields a [`crate::error::Error`] and the
//! bytes are dropped — no partial message ever reaches the TU. Pass 2 is
//! lazy: see [`crate::types::header::HeaderValue`].

pub mod headers;
pub mod uri;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::types::header::{HeaderList, HeaderValue};
use crate::types::header_name::HeaderName;
use crate::types::message::{Message, Origin, Request, Response};
use crate::types::method::Method;
use crate::types::status::StatusCode;

enum StartLine {
    Request { method: Method, uri: String },
    Response { status: StatusCode, reason: String },
}

/// Parse one complete SIP message out of `input`.
///
/// `input` must contain exactly one message (the framing layer's job, per
/// §4.1, is to hand this function exactly that). Returns a
/// [`Error::MalformedStartLine`], [`Error::MalformedHeader`],
/// [`Error::UnterminatedHeaders`], or [`Error::ContentLengthMismatch`] on any
/// syntactic problem; those are local parse errors per §7 and never reach
/// the TU.
pub fn parse_message(input: &[u8]) -> Result<Message> {
    let (header_block, body_start) = split_header_block(input)?;
    let mut lines = split_lines(header_block);

    let start_line_raw = lines.next().ok_or_else(|| {
        Error::MalformedStartLine("empty message".to_string())
    })?;
    let start_line = parse_start_line(start_line_raw)?;

    let headers = parse_headers(lines)?;

    let declared_len = headers
        .first(&HeaderName::ContentLength)
        .and_then(|h| h.as_uint().ok());
    let available = &input[body_start..];
    let body: Bytes = match declared_len {
        Some(len) => {
            let len = len as usize;
            if len > available.len() {
                return Err(Error::ContentLengthMismatch {
                    expected: len,
                    actual: available.len(),
                });
            }
            Bytes::copy_from_slice(&available[..len])
        }
        None => Bytes::copy_from_slice(available),
    };

    Ok(match start_line {
        StartLine::Request { method, uri } => Message::Request(Request {
            method,
            uri: uri.parse().map_err(|_| Error::InvalidUri(uri))?,
            headers,
            body,
            origin: Origin::Network,
        }),
        StartLine::Response { status, reason } => Message::Response(Response {
            status,
            reason,
            headers,
            body,
            origin: Origin::Network,
        }),
    })
}

/// Returns the header block (start line + header lines, CRLF-terminated
/// internally) and the byte offset the body starts at.
fn split_header_block(input: &[u8]) -> Result<(&[u8], usize)> {
    let (header_end, body_start) =
        find_header_terminator(input).ok_or(Error::UnterminatedHeaders)?;
    Ok((&input[..header_end], body_start))
}

/// Locate the blank line that ends the header block, returning
/// `(header_block_end, body_start)` offsets. Unlike [`split_header_block`]
/// this never errors — "not found yet" is the normal state of a stream
/// transport's reassembly buffer waiting on more bytes (§4.1), not a parse
/// failure.
///
/// Accepts CRLFCRLF strictly, LFLF leniently (real-world peers sometimes
/// send bare LFs — tolerating them here keeps the parser forgiving without
/// weakening header grammar itself, per §1's purpose).
pub fn find_header_terminator(input: &[u8]) -> Option<(usize, usize)> {
    for i in 0..input.len() {
        if input[i..].starts_with(b"\r\n\r\n") {
            return Some((i + 2, i + 4));
        }
        if input[i..].starts_with(b"\n\n") {
            return Some((i + 1, i + 2));
        }
    }
    None
}

/// Given a header block up to (but not including) its terminating blank
/// line, find the declared `Content-Length`, if any. Exposed for the stream
/// transport's reassembly buffer (§4.1): it needs to know how many body
/// bytes to wait for before handing a candidate slice to [`parse_message`].
pub fn peek_content_length(header_block: &[u8]) -> Option<usize> {
    // Skip the start line; only header lines matter here.
    let mut lines = split_lines(header_block);
    lines.next()?;
    for line in lines {
        if let Some(colon) = line.iter().position(|&b| b == b':') {
            let name = HeaderName::parse(String::from_utf8_lossy(&line[..colon]).trim());
            if name == HeaderName::ContentLength {
                let val = String::from_utf8_lossy(&line[colon + 1..]).trim().to_string();
                return val.parse::<usize>().ok();
            }
        }
    }
    None
}

fn split_lines(block: &[u8]) -> impl Iterator<Item = &[u8]> {
    block
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.is_empty())
}

fn parse_start_line(line: &[u8]) -> Result<StartLine> {
    let text = std::str::from_utf8(line)
        .map_err(|_| Error::MalformedStartLine("not valid UTF-8".to_string()))?;
    let parts: Vec<&str> = text.splitn(3, ' ').collect();
    if parts.len() != 3 {
        return Err(Error::MalformedStartLine(text.to_string()));
    }

    if parts[0] == "SIP/2.0" {
        let code: u16 = parts[1]
            .parse()
            .map_err(|_| Error::MalformedStartLine(text.to_string()))?;
        let status = StatusCode::new(code).map_err(|_| Error::MalformedStartLine(text.to_string()))?;
        Ok(StartLine::Response {
            status,
            reason: parts[2].to_string(),
        })
    } else if parts[2] == "SIP/2.0" {
        let method: Method = parts[0]
            .parse()
            .map_err(|_| Error::MalformedStartLine(text.to_string()))?;
        Ok(StartLine::Request {
            method,
            uri: parts[1].to_string(),
        })
    } else {
        Err(Error::MalformedStartLine(text.to_string()))
    }
}

fn parse_headers<'a>(lines: impl Iterator<Item = &'a [u8]>) -> Result<HeaderList> {
    let mut headers = HeaderList::new();
    let mut last_name: Option<HeaderName> = None;
    let mut last_value: Option<String> = None;

    for line in lines {
        if (line.first() == Some(&b' ') || line.first() == Some(&b'\t')) && last_name.is_some() {
            // Folded continuation line (RFC 2822 §2.2.3 obs-fold, still seen
            // on the wire): append to the previous header's value.
            if let Some(v) = last_value.as_mut() {
                v.push(' ');
                v.push_str(std::str::from_utf8(line).unwrap_or("").trim());
            }
            continue;
        }

        if let Some(name) = last_name.take() {
            headers.push(HeaderValue::new(name, last_value.take().unwrap_or_default()));
        }

        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or_else(|| Error::MalformedHeader(String::from_utf8_lossy(line).to_string()))?;
        let name = String::from_utf8_lossy(&line[..colon]).trim().to_string();
        let value = String::from_utf8_lossy(&line[colon + 1..]).trim().to_string();

        last_name = Some(HeaderName::parse(&name));
        last_value = Some(value);
    }

    if let Some(name) = last_name.take() {
        headers.push(HeaderValue::new(name, last_value.take().unwrap_or_default()));
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVITE: &[u8] = b"INVITE sip:bob@biloxi.com SIP/2.0\r\n\
Via: SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds\r\n\
From: Alice <sip:alice@atlanta.com>;tag=1928301774\r\n\
To: Bob <sip:bob@biloxi.com>\r\n\
Call-ID: a84b4c76e66710@pc33.atlanta.com\r\n\
CSeq: 314159 INVITE\r\n\
Max-Forwards: 70\r\n\
Content-Length: 4\r\n\
\r\n\
body";

    #[test]
    fn parses_well_formed_invite() {
        let msg = parse_message(INVITE).unwrap();
        let req = msg.as_request().unwrap();
        assert_eq!(req.method, Method::Invite);
        assert!(req.has_required_headers());
        assert_eq!(&req.body[..], b"body");
    }

    #[test]
    fn rejects_header_without_colon() {
        let bad = b"INVITE sip:bob@biloxi.com SIP/2.0\r\nGarbageLine\r\n\r\n";
        assert!(matches!(
            parse_message(bad),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn rejects_unterminated_headers() {
        let bad = b"INVITE sip:bob@biloxi.com SIP/2.0\r\nVia: SIP/2.0/UDP h\r\n";
        assert!(matches!(parse_message(bad), Err(Error::UnterminatedHeaders)));
    }

    #[test]
    fn rejects_content_length_exceeding_available_bytes() {
        let bad = b"INVITE sip:bob@biloxi.com SIP/2.0\r\nContent-Length: 100\r\n\r\nshort";
        assert!(matches!(
            parse_message(bad),
            Err(Error::ContentLengthMismatch { .. })
        ));
    }

    #[test]
    fn parses_status_line_response() {
        let resp = b"SIP/2.0 200 OK\r\nCSeq: 1 INVITE\r\nVia: SIP/2.0/UDP h;branch=z9hG4bK1\r\n\r\n";
        let msg = parse_message(resp).unwrap();
        assert_eq!(msg.as_response().unwrap().status, StatusCode::OK);
    }
}
