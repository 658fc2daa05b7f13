//! Address-family headers (From, To, Contact, Route, Record-Route, Reply-To,
//! Refer-To): `["display name"] <uri> *(;param)`.

use std::fmt;

use crate::error::Error;
use crate::parser::headers::parse_address;
use crate::types::params::ParamList;
use crate::types::uri::Uri;

/// A parsed address header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub display_name: Option<String>,
    pub uri: Uri,
    pub params: ParamList,
}

impl Address {
    pub fn new(uri: Uri) -> Self {
        Address {
            display_name: None,
            uri,
            params: ParamList::new(),
        }
    }

    pub fn tag(&self) -> Option<&str> {
        self.params.get("tag").flatten()
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.params.set("tag", Some(tag.into()));
    }

    pub fn parse(raw: &str) -> Result<Self, Error> {
        parse_address(raw.as_bytes())
            .map(|(_, addr)| addr)
            .map_err(|_| Error::HeaderGrammar {
                header: "address".into(),
                reason: format!("could not parse {:?}", raw),
            })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.display_name {
            write!(f, "\"{}\" ", name)?;
        }
        write!(f, "<{}>{}", self.uri, self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_display_name_and_tag() {
        let a = Address::parse("\"Alice\" <sip:alice@atlanta.com>;tag=1928301774").unwrap();
        assert_eq!(a.display_name.as_deref(), Some("Alice"));
        assert_eq!(a.tag(), Some("1928301774"));
        assert_eq!(a.uri.user.as_deref(), Some("alice"));
    }

    #[test]
    fn parses_bare_uri_without_brackets() {
        let a = Address::parse("sip:bob@biloxi.com").unwrap();
        assert!(a.display_name.is_none());
        assert_eq!(a.uri.host, "biloxi.com");
    }
}
