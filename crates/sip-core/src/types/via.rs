//! The Via header (RFC 3261 §20.42): protocol/version/transport/host/port/params.

use std::fmt;

use crate::error::Error;
use crate::parser::headers::parse_via;
use crate::types::params::ParamList;

/// The magic cookie that marks an RFC 3261-compliant branch parameter.
pub const MAGIC_COOKIE: &str = "z9hG4bK";

/// One Via header value: `SIP/2.0/UDP host:port;branch=...;received=...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Via {
    pub protocol_name: String,
    pub protocol_version: String,
    pub transport: String,
    pub sent_host: String,
    pub sent_port: Option<u16>,
    pub params: ParamList,
}

impl Via {
    pub fn new(transport: impl Into<String>, host: impl Into<String>, port: Option<u16>) -> Self {
        Via {
            protocol_name: "SIP".into(),
            protocol_version: "2.0".into(),
            transport: transport.into(),
            sent_host: host.into(),
            sent_port: port,
            params: ParamList::new(),
        }
    }

    pub fn branch(&self) -> Option<&str> {
        self.params.get("branch").flatten()
    }

    pub fn set_branch(&mut self, branch: impl Into<String>) {
        self.params.set("branch", Some(branch.into()));
    }

    /// `true` if the branch begins with the RFC 3261 magic cookie.
    pub fn has_rfc3261_branch(&self) -> bool {
        self.branch()
            .map(|b| b.starts_with(MAGIC_COOKIE))
            .unwrap_or(false)
    }

    pub fn received(&self) -> Option<&str> {
        self.params.get("received").flatten()
    }

    pub fn set_received(&mut self, addr: impl Into<String>) {
        self.params.set("received", Some(addr.into()));
    }

    pub fn set_rport(&mut self, port: u16) {
        self.params.set("rport", Some(port.to_string()));
    }

    pub fn has_rport_request(&self) -> bool {
        self.params.has("rport")
    }

    /// `sent-by` as a host:port pair used when routing a response back to
    /// the peer that sent this request (§3's transport tuple peer side).
    pub fn sent_by(&self) -> (String, Option<u16>) {
        (self.sent_host.clone(), self.sent_port)
    }

    pub fn parse(raw: &str) -> Result<Self, Error> {
        parse_via(raw.as_bytes())
            .map(|(_, via)| via)
            .map_err(|_| Error::HeaderGrammar {
                header: "Via".into(),
                reason: format!("could not parse {:?}", raw),
            })
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{} {}",
            self.protocol_name, self.protocol_version, self.transport, self.sent_host
        )?;
        if let Some(port) = self.sent_port {
            write!(f, ":{}", port)?;
        }
        write!(f, "{}", self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_rfc3261_branch() {
        let mut v = Via::new("UDP", "pc33.atlanta.com", None);
        v.set_branch("z9hG4bK776asdhds");
        assert!(v.has_rfc3261_branch());
    }

    #[test]
    fn non_cookie_branch_is_legacy() {
        let mut v = Via::new("UDP", "pc33.atlanta.com", None);
        v.set_branch("987asjd9");
        assert!(!v.has_rfc3261_branch());
    }

    #[test]
    fn round_trips_via_text() {
        let v = Via::parse("SIP/2.0/UDP pc33.atlanta.com:5060;branch=z9hG4bK776asdhds").unwrap();
        assert_eq!(v.transport, "UDP");
        assert_eq!(v.sent_port, Some(5060));
        assert_eq!(v.branch(), Some("z9hG4bK776asdhds"));
    }
}
