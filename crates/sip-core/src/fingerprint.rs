//! The RFC 3261 §17.2.3 transaction-matching fingerprint (spec §4.2).
//!
//! ACK always folds onto the INVITE transaction's fingerprint, in both the
//! branch-based and legacy forms. CANCEL folds onto it only in the legacy
//! (MD5) form — in the branch-based form CANCEL keeps its own method
//! component (it shares the INVITE's branch but is CSeq-tagged CANCEL), so
//! matching an inbound CANCEL to its INVITE server transaction is a
//! dedicated lookup ([`invite_lookup_fingerprint`]), not a plain
//! `request_fingerprint` hashmap hit.

use md5::{Digest, Md5};

use crate::types::header_name::HeaderName;
use crate::types::message::{Request, Response};
use crate::types::method::Method;

/// The deterministic key the transaction layer uses to match a message to a
/// transaction. Stable across retransmissions by construction (§8 property 2).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    /// RFC 3261 branch-based matching: `(branch, top-Via sent-by, method)`.
    Branch {
        branch: String,
        sent_by: String,
        method: Method,
    },
    /// RFC 2543 back-compat matching: an MD5 digest over the canonical field
    /// list in §4.2.
    Legacy([u8; 16]),
}

fn branch_fingerprint_method(method: &Method) -> Method {
    match method {
        Method::Ack => Method::Invite,
        other => other.clone(),
    }
}

fn legacy_fingerprint_method(method: &Method) -> Method {
    match method {
        Method::Ack | Method::Cancel => Method::Invite,
        other => other.clone(),
    }
}

/// Compute the fingerprint of an inbound or outbound request, for its own
/// transaction table entry.
pub fn request_fingerprint(req: &Request) -> Option<Fingerprint> {
    request_fingerprint_as(req, branch_fingerprint_method(&req.method), legacy_fingerprint_method(&req.method))
}

/// The fingerprint under which a request's INVITE counterpart would be
/// filed, regardless of the request's own method. Used to look up the
/// INVITE server transaction an ACK or CANCEL relates to (§4.5).
pub fn invite_lookup_fingerprint(req: &Request) -> Option<Fingerprint> {
    request_fingerprint_as(req, Method::Invite, Method::Invite)
}

fn request_fingerprint_as(
    req: &Request,
    branch_method: Method,
    legacy_method: Method,
) -> Option<Fingerprint> {
    let via = req.headers.first(&HeaderName::Via)?.as_via().ok()?;

    if via.has_rfc3261_branch() {
        let branch = via.branch()?.to_string();
        let (host, port) = via.sent_by();
        let sent_by = match port {
            Some(p) => format!("{host}:{p}"),
            None => host,
        };
        return Some(Fingerprint::Branch {
            branch,
            sent_by,
            method: branch_method,
        });
    }

    legacy_request_fingerprint(req, legacy_method)
}

fn legacy_request_fingerprint(req: &Request, method: Method) -> Option<Fingerprint> {
    let via = req.headers.first(&HeaderName::Via)?.as_via().ok()?;
    let from = req.headers.first(&HeaderName::From)?.as_address().ok()?;
    let call_id = req.headers.first(&HeaderName::CallId)?.raw().to_string();
    let (cseq_num, _) = req.headers.first(&HeaderName::CSeq)?.as_cseq().ok()?;

    // §9 open question: the original source includes the request-URI
    // password in the legacy hash. Preserved here for bit-exact matching
    // with legacy peers; see DESIGN.md.
    let mut hasher = Md5::new();
    hasher.update(req.uri.scheme.to_string().as_bytes());
    hasher.update(req.uri.user.as_deref().unwrap_or("").as_bytes());
    hasher.update(req.uri.host.as_bytes());
    hasher.update(req.uri.port.map(|p| p.to_string()).unwrap_or_default().as_bytes());
    hasher.update(req.uri.password.as_deref().unwrap_or("").as_bytes());
    hasher.update(req.uri.params.to_string().as_bytes());

    hasher.update(via.protocol_name.as_bytes());
    hasher.update(via.protocol_version.as_bytes());
    hasher.update(via.transport.as_bytes());
    hasher.update(via.sent_host.as_bytes());
    hasher.update(via.sent_port.map(|p| p.to_string()).unwrap_or_default().as_bytes());
    hasher.update(via.params.to_string().as_bytes());

    hasher.update(from.tag().unwrap_or("").as_bytes());

    let is_invite_like = matches!(method, Method::Invite);
    if !is_invite_like {
        if let Some(to) = req.headers.first(&HeaderName::To).and_then(|h| h.as_address().ok()) {
            hasher.update(to.tag().unwrap_or("").as_bytes());
        }
    }

    hasher.update(call_id.as_bytes());
    hasher.update(cseq_num.to_string().as_bytes());
    hasher.update(method.as_str().as_bytes());

    let digest: [u8; 16] = hasher.finalize().into();
    Some(Fingerprint::Legacy(digest))
}

/// Compute the fingerprint a response would match against, derived from its
/// own top Via and CSeq (the response carries the same Via/branch the
/// request did, per §18.1.2).
pub fn response_fingerprint(resp: &Response) -> Option<Fingerprint> {
    let via = resp.headers.first(&HeaderName::Via)?.as_via().ok()?;
    let (_, method) = resp.headers.first(&HeaderName::CSeq)?.as_cseq().ok()?;

    if via.has_rfc3261_branch() {
        let branch = via.branch()?.to_string();
        let (host, port) = via.sent_by();
        let sent_by = match port {
            Some(p) => format!("{host}:{p}"),
            None => host,
        };
        return Some(Fingerprint::Branch {
            branch,
            sent_by,
            method: branch_fingerprint_method(&method),
        });
    }
    None
}
