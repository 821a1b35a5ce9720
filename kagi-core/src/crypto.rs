//! Token hashing and comparison
//!
//! Records never hold the plaintext token. The store keeps a SHA256 digest and compares
//! digests with the `subtle` crate so a mismatch takes the same time wherever it occurs.
//!
//! Callers that do not already have a token of their own can use
//! [`generate_secure_token`] to mint one with 256 bits of entropy.

use rand::{TryRngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Generate a cryptographically secure random token.
///
/// Produces 32 random bytes encoded as URL-safe base64 without padding (43 characters),
/// suitable for embedding in a login link or a remember-me cookie.
///
/// # Panics
///
/// Panics if the OS random number generator fails. There is no safe fallback for a
/// credential generator when the system entropy source is unavailable.
pub fn generate_secure_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

/// Hash a token for storage, returning the hex-encoded SHA256 digest.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a presented token against a stored digest in constant time.
pub fn verify_token_hash(token: &str, stored_hash: &str) -> bool {
    let computed_hash = hash_token(token);
    constant_time_compare(computed_hash.as_bytes(), stored_hash.as_bytes())
}

/// Constant-time equality of two byte slices. Slices of different length are unequal.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
