//! Random token generation for branches, tags, and Call-IDs.

use rand::RngCore;

use crate::types::via::MAGIC_COOKIE;

/// A fresh RFC 3261-compliant branch: the magic cookie plus 16 random hex
/// digits. Used by the transaction layer for every client transaction and
/// by the CANCEL/ACK machinery that must mint its own branch.
pub fn new_branch() -> String {
    format!("{}{}", MAGIC_COOKIE, random_hex(16))
}

/// A fresh From/To tag.
pub fn new_tag() -> String {
    random_hex(10)
}

/// A fresh globally-unique Call-ID for the given local host part.
pub fn new_call_id(host: &str) -> String {
    format!("{}@{}", uuid::Uuid::new_v4(), host)
}

fn random_hex(len: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut bytes = vec![0u8; len];
    rng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:x}", b % 16)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_carries_magic_cookie() {
        assert!(new_branch().starts_with(MAGIC_COOKIE));
    }

    #[test]
    fn call_id_contains_host_part() {
        assert!(new_call_id("pc33.atlanta.com").ends_with("pc33.atlanta.com"));
    }
}
