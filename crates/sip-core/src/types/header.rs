//! The lazily-parsed header cell and the ordered header list (§3 "Header value").

use std::fmt;

use once_cell::unsync::OnceCell;

use crate::error::Error;
use crate::types::address::Address;
use crate::types::header_name::HeaderName;
use crate::types::method::Method;
use crate::types::via::Via;

/// The cached typed form a [`HeaderValue`] parses into on first access.
#[derive(Debug, Clone)]
enum Parsed {
    Via(Via),
    Address(Address),
    CSeq(u32, Method),
    UInt(u64),
    List(Vec<String>),
}

/// One header value: the original text plus a cache that's populated the
/// first time a typed accessor is called.
///
/// Unknown headers are never given a typed accessor, so their cache simply
/// never gets touched — they round-trip as opaque strings, per §3.
pub struct HeaderValue {
    name: HeaderName,
    raw: String,
    cache: OnceCell<Parsed>,
}

impl HeaderValue {
    pub fn new(name: HeaderName, raw: impl Into<String>) -> Self {
        HeaderValue {
            name,
            raw: raw.into(),
            cache: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &HeaderName {
        &self.name
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn as_via(&self) -> Result<&Via, Error> {
        let parsed = self
            .cache
            .get_or_try_init(|| Via::parse(&self.raw).map(Parsed::Via))?;
        match parsed {
            Parsed::Via(v) => Ok(v),
            _ => unreachable!("Via cell cached a non-Via value"),
        }
    }

    pub fn as_address(&self) -> Result<&Address, Error> {
        let parsed = self
            .cache
            .get_or_try_init(|| Address::parse(&self.raw).map(Parsed::Address))?;
        match parsed {
            Parsed::Address(a) => Ok(a),
            _ => unreachable!("address cell cached a non-address value"),
        }
    }

    /// CSeq parses into `(sequence, method)`.
    pub fn as_cseq(&self) -> Result<(u32, Method), Error> {
        let parsed = self.cache.get_or_try_init(|| {
            let mut parts = self.raw.trim().splitn(2, char::is_whitespace);
            let seq: u32 = parts
                .next()
                .ok_or_else(|| Error::HeaderGrammar {
                    header: "CSeq".into(),
                    reason: "missing sequence number".into(),
                })?
                .parse()
                .map_err(|_| Error::HeaderGrammar {
                    header: "CSeq".into(),
                    reason: "sequence number not an integer".into(),
                })?;
            let method_tok = parts.next().ok_or_else(|| Error::HeaderGrammar {
                header: "CSeq".into(),
                reason: "missing method".into(),
            })?;
            let method: Method = method_tok.trim().parse()?;
            Ok(Parsed::CSeq(seq, method))
        })?;
        match parsed {
            Parsed::CSeq(seq, method) => Ok((*seq, method.clone())),
            _ => unreachable!("CSeq cell cached a non-CSeq value"),
        }
    }

    /// Integer-valued headers: Max-Forwards, Content-Length, Expires.
    pub fn as_uint(&self) -> Result<u64, Error> {
        let parsed = self.cache.get_or_try_init(|| {
            self.raw
                .trim()
                .parse::<u64>()
                .map(Parsed::UInt)
                .map_err(|_| Error::HeaderGrammar {
                    header: self.name.canonical().to_string(),
                    reason: format!("{:?} is not an integer", self.raw),
                })
        })?;
        match parsed {
            Parsed::UInt(n) => Ok(*n),
            _ => unreachable!("uint cell cached a non-uint value"),
        }
    }

    /// Comma-separated list headers (Accept, Allow, Supported, Require, ...);
    /// each element is individually addressable.
    pub fn as_list(&self) -> &[String] {
        let parsed = self.cache.get_or_init(|| {
            let items = self
                .raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            Parsed::List(items)
        });
        match parsed {
            Parsed::List(items) => items,
            _ => unreachable!("list cell cached a non-list value"),
        }
    }
}

impl Clone for HeaderValue {
    fn clone(&self) -> Self {
        HeaderValue {
            name: self.name.clone(),
            raw: self.raw.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl fmt::Debug for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderValue")
            .field("name", &self.name)
            .field("raw", &self.raw)
            .finish()
    }
}

impl PartialEq for HeaderValue {
    /// Structural equality compares the name and raw text only — two header
    /// cells are equal regardless of whether either has been lazily parsed,
    /// which is what the round-trip invariant in §8 needs.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.raw == other.raw
    }
}

impl Eq for HeaderValue {}

/// An ordered multimap of header name to header value, insertion order
/// preserved across distinct names for round-trip fidelity (§3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList(Vec<HeaderValue>);

impl HeaderList {
    pub fn new() -> Self {
        HeaderList(Vec::new())
    }

    pub fn push(&mut self, value: HeaderValue) {
        self.0.push(value);
    }

    pub fn first(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.0.iter().find(|h| &h.name == name)
    }

    pub fn all(&self, name: &HeaderName) -> impl Iterator<Item = &HeaderValue> {
        self.0.iter().filter(move |h| &h.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderValue> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn remove_all(&mut self, name: &HeaderName) {
        self.0.retain(|h| &h.name != name);
    }

    /// Replaces the first occurrence of `name` in place, preserving its
    /// position; appends `value` if no such header exists yet.
    pub fn replace_first(&mut self, name: &HeaderName, value: HeaderValue) {
        match self.0.iter_mut().find(|h| &h.name == name) {
            Some(slot) => *slot = value,
            None => self.0.push(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_via_parses_once_and_caches() {
        let h = HeaderValue::new(
            HeaderName::Via,
            "SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds",
        );
        let v1 = h.as_via().unwrap();
        assert_eq!(v1.transport, "UDP");
        // Second access reuses the cache; same data either way.
        let v2 = h.as_via().unwrap();
        assert_eq!(v1, v2);
    }

    #[test]
    fn unknown_header_roundtrips_without_typed_access() {
        let h = HeaderValue::new(HeaderName::Other("X-Foo".into()), "bar; baz=1");
        assert_eq!(h.raw(), "bar; baz=1");
    }

    #[test]
    fn cseq_parses_sequence_and_method() {
        let h = HeaderValue::new(HeaderName::CSeq, "314159 INVITE");
        let (seq, method) = h.as_cseq().unwrap();
        assert_eq!(seq, 314159);
        assert_eq!(method, Method::Invite);
    }
}
