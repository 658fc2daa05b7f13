//! The DNS/locator collaborator (§6): resolves a request's destination URI
//! to an ordered list of candidate `(address, transport)` pairs per RFC 3263
//! (NAPTR -> SRV -> A/AAAA, simplified).

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::transport::Protocol;

/// One resolved destination: an address to connect/send to and the
/// transport to use for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub addr: SocketAddr,
    pub protocol: Protocol,
}

/// RFC 3263 §6 default port when a URI specifies neither a numeric port
/// nor a transport-implied one.
pub const DEFAULT_SIP_PORT: u16 = 5060;
pub const DEFAULT_SIPS_PORT: u16 = 5061;

#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve `host` to an ordered list of candidates, honoring
    /// `transport_hint` (the URI's `transport` parameter, if present) and
    /// `port` (the URI's explicit port, if present).
    async fn resolve(
        &self,
        host: &str,
        port: Option<u16>,
        transport_hint: Option<Protocol>,
    ) -> Result<Vec<Destination>>;
}

/// A resolver backed by the system's blocking `getaddrinfo`, run on a
/// blocking thread so it never stalls the Dispatcher loop. No NAPTR/SRV
/// lookups: a host that needs those should be resolved upstream and handed
/// in as a literal IP.
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(
        &self,
        host: &str,
        port: Option<u16>,
        transport_hint: Option<Protocol>,
    ) -> Result<Vec<Destination>> {
        let protocol = transport_hint.unwrap_or(Protocol::Udp);
        let resolved_port = port.unwrap_or(DEFAULT_SIP_PORT);

        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![Destination {
                addr: SocketAddr::new(ip, resolved_port),
                protocol,
            }]);
        }

        let lookup = format!("{host}:{resolved_port}");
        let addrs = tokio::task::spawn_blocking(move || lookup.to_socket_addrs())
            .await
            .map_err(|e| Error::DnsFailure {
                host: host.to_string(),
                reason: e.to_string(),
            })?
            .map_err(|e| Error::DnsFailure {
                host: host.to_string(),
                reason: e.to_string(),
            })?;

        let destinations: Vec<Destination> = addrs
            .map(|addr| Destination { addr, protocol })
            .collect();

        if destinations.is_empty() {
            return Err(Error::DnsFailure {
                host: host.to_string(),
                reason: "no addresses returned".to_string(),
            });
        }

        Ok(destinations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_literal_ip_without_lookup() {
        let resolver = SystemResolver;
        let result = resolver
            .resolve("127.0.0.1", Some(5060), Some(Protocol::Tcp))
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].addr.port(), 5060);
        assert_eq!(result[0].protocol, Protocol::Tcp);
    }
}
