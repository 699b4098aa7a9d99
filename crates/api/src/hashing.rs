//! Salted-digest password hashing.
//!
//! Dev-grade implementation of the `PasswordHasher` seam; a KDF-backed
//! hasher can replace it behind the same trait without touching callers.
//! Stored format: `<salt-hex>$<digest-hex>`.

use rand::RngCore;
use sha2::{Digest, Sha256};

use pitstop_auth::PasswordHasher;

#[derive(Debug, Default)]
pub struct SaltedSha256Hasher;

impl SaltedSha256Hasher {
    pub fn new() -> Self {
        Self
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn digest(salt: &str, plain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"$");
    hasher.update(plain.as_bytes());
    hex(&hasher.finalize())
}

impl PasswordHasher for SaltedSha256Hasher {
    fn hash(&self, plain: &str) -> String {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let salt = hex(&salt);
        let digest = digest(&salt, plain);
        format!("{salt}${digest}")
    }

    fn verify(&self, plain: &str, hash: &str) -> bool {
        match hash.split_once('$') {
            Some((salt, expected)) => digest(salt, plain) == expected,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() {
        let hasher = SaltedSha256Hasher::new();
        let hash = hasher.hash("hunter2");

        assert!(hasher.verify("hunter2", &hash));
        assert!(!hasher.verify("hunter3", &hash));
    }

    #[test]
    fn each_hash_gets_a_fresh_salt() {
        let hasher = SaltedSha256Hasher::new();
        assert_ne!(hasher.hash("same"), hasher.hash("same"));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        let hasher = SaltedSha256Hasher::new();
        assert!(!hasher.verify("anything", "no-separator-here"));
    }
}
