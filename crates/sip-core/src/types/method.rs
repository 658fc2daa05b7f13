//! SIP request methods (RFC 3261 §7.1 and common extensions).

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A SIP request method.
///
/// Unknown tokens are preserved verbatim in [`Method::Extension`] so that the
/// parser never rejects a syntactically valid request just because it names a
/// method this crate doesn't special-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Invite,
    Ack,
    Bye,
    Cancel,
    Options,
    Register,
    Prack,
    Subscribe,
    Notify,
    Publish,
    Info,
    Refer,
    Message,
    Update,
    /// Any other method token, preserved byte-for-byte.
    Extension(String),
}

impl Method {
    /// The canonical wire token for this method.
    pub fn as_str(&self) -> &str {
        match self {
            Method::Invite => "INVITE",
            Method::Ack => "ACK",
            Method::Bye => "BYE",
            Method::Cancel => "CANCEL",
            Method::Options => "OPTIONS",
            Method::Register => "REGISTER",
            Method::Prack => "PRACK",
            Method::Subscribe => "SUBSCRIBE",
            Method::Notify => "NOTIFY",
            Method::Publish => "PUBLISH",
            Method::Info => "INFO",
            Method::Refer => "REFER",
            Method::Message => "MESSAGE",
            Method::Update => "UPDATE",
            Method::Extension(s) => s.as_str(),
        }
    }

    /// `true` for methods that create a dialog-forming INVITE-shaped transaction
    /// (only INVITE itself; ACK and CANCEL are transaction-adjacent but are
    /// handled specially by the transaction layer, see §4.5).
    pub fn is_invite(&self) -> bool {
        matches!(self, Method::Invite)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(Error::InvalidMethod(s.to_string()));
        }
        Ok(match s {
            "INVITE" => Method::Invite,
            "ACK" => Method::Ack,
            "BYE" => Method::Bye,
            "CANCEL" => Method::Cancel,
            "OPTIONS" => Method::Options,
            "REGISTER" => Method::Register,
            "PRACK" => Method::Prack,
            "SUBSCRIBE" => Method::Subscribe,
            "NOTIFY" => Method::Notify,
            "PUBLISH" => Method::Publish,
            "INFO" => Method::Info,
            "REFER" => Method::Refer,
            "MESSAGE" => Method::Message,
            "UPDATE" => Method::Update,
            other => Method::Extension(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_methods() {
        for m in ["INVITE", "ACK", "BYE", "CANCEL", "OPTIONS", "REGISTER"] {
            let parsed: Method = m.parse().unwrap();
            assert_eq!(parsed.as_str(), m);
        }
    }

    #[test]
    fn preserves_unknown_tokens() {
        let parsed: Method = "XFOO".parse().unwrap();
        assert_eq!(parsed, Method::Extension("XFOO".to_string()));
        assert_eq!(parsed.to_string(), "XFOO");
    }

    #[test]
    fn rejects_empty_method() {
        assert!("".parse::<Method>().is_err());
    }
}
