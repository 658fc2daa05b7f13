//! SIP/SIPS URI (RFC 3261 §19.1).

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::parser::uri::parse_uri;
use crate::types::params::ParamList;

/// URI scheme. `Sip` and `Sips` are what this stack routes on; anything else
/// (`tel:`, `im:`, ...) is kept as an opaque scheme so addressable headers
/// that carry a non-SIP URI still round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scheme {
    Sip,
    Sips,
    Other(String),
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Sip => write!(f, "sip"),
            Scheme::Sips => write!(f, "sips"),
            Scheme::Other(s) => write!(f, "{}", s),
        }
    }
}

/// A parsed SIP URI: `sip:user:password@host:port;params?headers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    pub scheme: Scheme,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    pub params: ParamList,
    /// Raw `?name=value&...` header component, kept unparsed (used only by
    /// request-URI construction helpers, never by transaction matching).
    pub headers: Option<String>,
}

impl Uri {
    pub fn sip(host: impl Into<String>) -> Self {
        Uri {
            scheme: Scheme::Sip,
            user: None,
            password: None,
            host: host.into(),
            port: None,
            params: ParamList::new(),
            headers: None,
        }
    }

    /// The `transport` URI parameter, if present, uppercased for matching
    /// against a protocol name.
    pub fn transport_param(&self) -> Option<String> {
        self.params.get("transport").flatten().map(|s| s.to_ascii_uppercase())
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if let Some(user) = &self.user {
            write!(f, "{}", user)?;
            if let Some(pw) = &self.password {
                write!(f, ":{}", pw)?;
            }
            write!(f, "@")?;
        }
        write!(f, "{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        write!(f, "{}", self.params)?;
        if let Some(h) = &self.headers {
            write!(f, "?{}", h)?;
        }
        Ok(())
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_uri(s.as_bytes())
            .map(|(_, uri)| uri)
            .map_err(|_| Error::InvalidUri(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_simple_uri() {
        let uri: Uri = "sip:alice@example.com".parse().unwrap();
        assert_eq!(uri.user.as_deref(), Some("alice"));
        assert_eq!(uri.host, "example.com");
        assert_eq!(uri.to_string(), "sip:alice@example.com");
    }

    #[test]
    fn parses_port_and_transport_param() {
        let uri: Uri = "sip:bob@192.0.2.1:5070;transport=tcp".parse().unwrap();
        assert_eq!(uri.port, Some(5070));
        assert_eq!(uri.transport_param().as_deref(), Some("TCP"));
    }
}
