//! Credential hashing and bearer token generation
//!
//! Pure functions only. Storage lives in the service's database module.
//!
//! Passwords are stored as a salted, iterated SHA-256 digest. Tokens are opaque
//! random strings; they carry no claims and are only meaningful to the store
//! that issued them.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Random salt length in bytes
pub const SALT_LEN: usize = 16;

/// Bearer token length in bytes (hex encoded on the wire)
pub const TOKEN_LEN: usize = 32;

/// Hash iterations
pub const HASH_ROUNDS: u32 = 10_000;

/// Issued token lifetime
pub const TOKEN_LIFETIME_HOURS: i64 = 24;

/// Stored password: hex digest plus the hex salt it was derived with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    pub hash: String,
    pub salt: String,
}

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> PasswordHash {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = hex::encode(salt);
    let hash = derive_hash(password, &salt);
    PasswordHash { hash, salt }
}

/// Check a password against a stored hash
pub fn verify_password(password: &str, stored: &PasswordHash) -> bool {
    let candidate = derive_hash(password, &stored.salt);
    constant_time_eq(candidate.as_bytes(), stored.hash.as_bytes())
}

/// Generate an opaque bearer token
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn derive_hash(password: &str, salt: &str) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();

    for _ in 1..HASH_ROUNDS {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(password.as_bytes())
            .finalize();
    }

    hex::encode(digest)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_accepts_original_password() {
        let stored = hash_password("hunter22");
        assert!(verify_password("hunter22", &stored));
    }

    #[test]
    fn test_verify_rejects_wrong_password() {
        let stored = hash_password("hunter22");
        assert!(!verify_password("hunter23", &stored));
        assert!(!verify_password("", &stored));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let a = hash_password("same");
        let b = hash_password("same");
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let stored = hash_password("pw");
        assert_eq!(stored.hash.len(), 64);
        assert_eq!(stored.salt.len(), SALT_LEN * 2);
        assert!(stored.hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_tokens_are_unique_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_LEN * 2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_constant_time_eq_length_mismatch() {
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"abc", b"abc"));
    }
}
