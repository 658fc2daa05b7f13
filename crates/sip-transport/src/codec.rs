//! Wire Codec, decode side (§4.1): frames bytes from a transport into
//! complete messages before they ever reach the parser's pass 1.

use bytes::BytesMut;
use sip_core::Message;

use crate::error::{Error, Result};

/// `true` for the bare CRLF / CRLFCRLF keep-alive pings RFC 5626 §4.4
/// clients send to hold a NAT binding open. These never surface above the
/// codec (§4.1).
fn is_keepalive(chunk: &[u8]) -> bool {
    chunk.is_empty() || chunk == b"\r\n" || chunk == b"\r\n\r\n"
}

/// Datagram framing: every chunk handed in is exactly one message (or a
/// keep-alive). Oversize chunks are rejected outright — there is no
/// reassembly for datagram transports.
pub struct DatagramFramer {
    pub max_bytes: usize,
}

impl DatagramFramer {
    pub fn new(max_bytes: usize) -> Self {
        DatagramFramer { max_bytes }
    }

    /// Returns `Ok(None)` for an absorbed keep-alive, `Ok(Some(message))` on
    /// success, or `Err` if the chunk is oversize or fails to parse.
    pub fn frame(&self, chunk: &[u8]) -> Result<Option<Message>> {
        if is_keepalive(chunk) {
            return Ok(None);
        }
        if chunk.len() > self.max_bytes {
            return Err(Error::FrameTooLarge {
                actual: chunk.len(),
                limit: self.max_bytes,
            });
        }
        Ok(Some(sip_core::parse_message(chunk)?))
    }
}

/// Stream framing: maintains a per-connection reassembly buffer and extracts
/// messages using the Content-Length header (§4.1). If the first line isn't
/// a well-formed SIP start line, [`StreamFramer::drain`] returns an error and
/// the caller must close the connection.
pub struct StreamFramer {
    buf: BytesMut,
    max_bytes: usize,
}

impl StreamFramer {
    pub fn new(max_bytes: usize) -> Self {
        StreamFramer {
            buf: BytesMut::new(),
            max_bytes,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Extract every complete message currently buffered, alongside a count
    /// of RFC 5626 §4.4 double-CRLF keep-alive pings absorbed along the way
    /// — the caller owes each of those a single-CRLF reply. A lone single
    /// CRLF is also swallowed (some peers send it as the reply rather than
    /// the ping) but never counted, so this side never answers its own
    /// echo with another echo.
    pub fn drain(&mut self) -> Result<(Vec<Message>, usize)> {
        let mut out = Vec::new();
        let mut pings = 0usize;
        loop {
            while self.buf.starts_with(b"\r\n") {
                if self.buf.starts_with(b"\r\n\r\n") {
                    self.buf.advance_by(2);
                    pings += 1;
                } else {
                    self.buf.advance_by(2);
                    break;
                }
            }

            let Some((header_end, body_start)) = sip_core::find_header_terminator(&self.buf)
            else {
                if self.buf.len() > self.max_bytes {
                    return Err(Error::FrameTooLarge {
                        actual: self.buf.len(),
                        limit: self.max_bytes,
                    });
                }
                return Ok((out, pings));
            };

            let content_length = sip_core::peek_content_length(&self.buf[..header_end]).unwrap_or(0);
            let total_len = body_start + content_length;
            if self.buf.len() < total_len {
                if total_len > self.max_bytes {
                    return Err(Error::FrameTooLarge {
                        actual: total_len,
                        limit: self.max_bytes,
                    });
                }
                return Ok((out, pings));
            }

            let candidate = self.buf.split_to(total_len);
            let message = sip_core::parse_message(&candidate)?;
            out.push(message);
        }
    }
}

/// `BytesMut` doesn't have a stable `advance_by`; this trivial extension
/// keeps [`StreamFramer::drain`] readable.
trait AdvanceBy {
    fn advance_by(&mut self, n: usize);
}

impl AdvanceBy for BytesMut {
    fn advance_by(&mut self, n: usize) {
        let _ = self.split_to(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datagram_framer_absorbs_keepalive() {
        let framer = DatagramFramer::new(8192);
        assert!(framer.frame(b"\r\n").unwrap().is_none());
    }

    #[test]
    fn datagram_framer_rejects_oversize_chunk() {
        let framer = DatagramFramer::new(4);
        assert!(matches!(
            framer.frame(b"INVITE sip:bob SIP/2.0\r\n\r\n"),
            Err(Error::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn stream_framer_waits_for_full_body() {
        let mut framer = StreamFramer::new(8192);
        framer.push(b"OPTIONS sip:bob@biloxi.com SIP/2.0\r\nContent-Length: 4\r\n\r\n");
        assert!(framer.drain().unwrap().0.is_empty());
        framer.push(b"body");
        let (msgs, _) = framer.drain().unwrap();
        assert_eq!(msgs.len(), 1);
    }

    #[test]
    fn stream_framer_extracts_multiple_pipelined_messages() {
        let mut framer = StreamFramer::new(8192);
        let one = b"OPTIONS sip:bob@biloxi.com SIP/2.0\r\nContent-Length: 0\r\n\r\n";
        framer.push(one);
        framer.push(one);
        let (msgs, _) = framer.drain().unwrap();
        assert_eq!(msgs.len(), 2);
    }

    #[test]
    fn stream_framer_absorbs_leading_keepalive() {
        let mut framer = StreamFramer::new(8192);
        framer.push(b"\r\n\r\n");
        framer.push(b"OPTIONS sip:bob@biloxi.com SIP/2.0\r\nContent-Length: 0\r\n\r\n");
        let (msgs, pings) = framer.drain().unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(pings, 1);
    }

    #[test]
    fn stream_framer_counts_double_crlf_pings_but_not_lone_ones() {
        let mut framer = StreamFramer::new(8192);
        framer.push(b"\r\n\r\n");
        let (msgs, pings) = framer.drain().unwrap();
        assert!(msgs.is_empty());
        assert_eq!(pings, 1);

        framer.push(b"\r\n");
        let (msgs, pings) = framer.drain().unwrap();
        assert!(msgs.is_empty());
        assert_eq!(pings, 0);
    }
}
