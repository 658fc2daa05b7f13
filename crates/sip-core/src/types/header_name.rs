//! Header name normalization: compact forms, case-insensitive matching.

use std::fmt;

/// A SIP header name, case-insensitively comparable and aware of the small
/// set of compact forms RFC 3261 §7.3.3 defines (`v` for Via, `f` for From, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HeaderName {
    Via,
    From,
    To,
    CallId,
    CSeq,
    MaxForwards,
    Contact,
    ContentType,
    ContentLength,
    Route,
    RecordRoute,
    ReplyTo,
    ReferTo,
    Accept,
    Allow,
    UserAgent,
    Supported,
    Require,
    Expires,
    /// Any other header name, preserved exactly as seen on the wire.
    Other(String),
}

impl HeaderName {
    pub fn canonical(&self) -> &str {
        match self {
            HeaderName::Via => "Via",
            HeaderName::From => "From",
            HeaderName::To => "To",
            HeaderName::CallId => "Call-ID",
            HeaderName::CSeq => "CSeq",
            HeaderName::MaxForwards => "Max-Forwards",
            HeaderName::Contact => "Contact",
            HeaderName::ContentType => "Content-Type",
            HeaderName::ContentLength => "Content-Length",
            HeaderName::Route => "Route",
            HeaderName::RecordRoute => "Record-Route",
            HeaderName::ReplyTo => "Reply-To",
            HeaderName::ReferTo => "Refer-To",
            HeaderName::Accept => "Accept",
            HeaderName::Allow => "Allow",
            HeaderName::UserAgent => "User-Agent",
            HeaderName::Supported => "Supported",
            HeaderName::Require => "Require",
            HeaderName::Expires => "Expires",
            HeaderName::Other(s) => s.as_str(),
        }
    }

    /// `true` for the address-family headers that parse into name+URI+params.
    pub fn is_address_header(&self) -> bool {
        matches!(
            self,
            HeaderName::From
                | HeaderName::To
                | HeaderName::Contact
                | HeaderName::Route
                | HeaderName::RecordRoute
                | HeaderName::ReplyTo
                | HeaderName::ReferTo
        )
    }

    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "via" | "v" => HeaderName::Via,
            "from" | "f" => HeaderName::From,
            "to" | "t" => HeaderName::To,
            "call-id" | "i" => HeaderName::CallId,
            "cseq" => HeaderName::CSeq,
            "max-forwards" => HeaderName::MaxForwards,
            "contact" | "m" => HeaderName::Contact,
            "content-type" | "c" => HeaderName::ContentType,
            "content-length" | "l" => HeaderName::ContentLength,
            "route" => HeaderName::Route,
            "record-route" => HeaderName::RecordRoute,
            "reply-to" => HeaderName::ReplyTo,
            "refer-to" => HeaderName::ReferTo,
            "accept" => HeaderName::Accept,
            "allow" => HeaderName::Allow,
            "user-agent" => HeaderName::UserAgent,
            "supported" | "k" => HeaderName::Supported,
            "require" => HeaderName::Require,
            "expires" => HeaderName::Expires,
            _ => HeaderName::Other(raw.to_string()),
        }
    }
}

impl fmt::Display for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_forms_match_long_forms() {
        assert_eq!(HeaderName::parse("v"), HeaderName::Via);
        assert_eq!(HeaderName::parse("Via"), HeaderName::Via);
        assert_eq!(HeaderName::parse("VIA"), HeaderName::Via);
    }

    #[test]
    fn unknown_header_preserved_verbatim() {
        let h = HeaderName::parse("X-Custom-Header");
        assert_eq!(h.canonical(), "X-Custom-Header");
    }
}
