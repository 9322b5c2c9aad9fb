//! Cryptographic primitives shared by the shellward authority.
//!
//! # Purpose
//! Keeps the key-format and digest details (SSH wire encoding, legacy MD5
//! fingerprints, PKCS#1 challenge keys, password digests) out of the service
//! crate so the services only deal with strings and typed errors.
//!
//! # Key invariants
//! - SSH fingerprints use the legacy colon-separated MD5 form so existing
//!   stored fingerprints keep matching.
//! - Challenge signatures are PKCS#1 v1.5 over SHA-256 and are returned as
//!   standard (padded) base64.
//! - Password digests are compared in constant time.
//!
//! # Examples
//! ```rust
//! use shellward_crypto::{digest_matches, password_digest};
//!
//! let stored = password_digest("secret");
//! assert!(digest_matches(&password_digest("secret"), &stored));
//! assert!(!digest_matches(&password_digest("Secret"), &stored));
//! ```
mod challenge;
mod digest;
mod error;
mod ssh;

pub use challenge::{
    ChallengeKeypair, DEFAULT_CHALLENGE_KEY_BITS, generate_challenge_keypair, sign_challenge,
    verify_challenge,
};
pub use digest::{digest_matches, password_digest, sha256_hex};
pub use error::{CryptoError, CryptoResult};
pub use ssh::{ParsedPublicKey, legacy_md5_fingerprint, parse_authorized_key};
