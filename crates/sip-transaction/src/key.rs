//! The transaction table key: a message's fingerprint (§4.2) tagged with
//! which table it addresses. Client and server transactions are matched
//! independently (§4.5 "Matching incoming messages") so the two roles never
//! collide even if, in principle, the underlying fingerprint did.

use std::fmt;

use sip_core::Fingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Role {
    Client,
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionKey {
    role: Role,
    fingerprint: Fingerprint,
}

impl TransactionKey {
    pub fn client(fingerprint: Fingerprint) -> Self {
        TransactionKey {
            role: Role::Client,
            fingerprint,
        }
    }

    pub fn server(fingerprint: Fingerprint) -> Self {
        TransactionKey {
            role: Role::Server,
            fingerprint,
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn is_client(&self) -> bool {
        self.role == Role::Client
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            Role::Client => "client",
            Role::Server => "server",
        };
        write!(f, "{role}:{:?}", self.fingerprint)
    }
}
