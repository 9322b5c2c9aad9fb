use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Digest stored for user passwords: hex SHA-256 of the UTF-8 password.
///
/// This matches the digests already persisted for existing accounts; it is
/// not a password-hashing KDF.
pub fn password_digest(password: &str) -> String {
    sha256_hex(password.as_bytes())
}

/// Compare two digests without short-circuiting on the first differing byte.
///
/// Length mismatches return `false` immediately; digest length is not secret.
pub fn digest_matches(candidate: &str, stored: &str) -> bool {
    candidate.as_bytes().ct_eq(stored.as_bytes()).into()
}
