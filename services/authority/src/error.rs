//! Error types surfaced by the authority services.
//!
//! # Purpose
//! `AuthError` is the single error every service operation returns. Store and
//! cache errors are converted at the boundary so callers can match on intent
//! (`NotFound`, `Unauthorized`, ...) rather than on backend details.
//! `StartupError` covers process bring-up and is never produced while serving
//! a request.
use crate::cache::CacheError;
use crate::store::StoreError;
use shellward_crypto::CryptoError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid public key format: {0}")]
    InvalidFormat(String),
    #[error("invalid hostname pattern: {0}")]
    InvalidPattern(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),
    #[error("user {user} is not a member of namespace {tenant_id}")]
    NotMember { tenant_id: String, user: String },
    #[error("duplicate public key fingerprint: {0}")]
    DuplicateFingerprint(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("store failure: {0}")]
    Store(#[source] anyhow::Error),
    #[error("cache failure: {0}")]
    Cache(#[from] CacheError),
    #[error("signing failure: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("crypto failure: {0}")]
    Crypto(#[from] CryptoError),
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AuthError::NotFound(what),
            StoreError::Conflict(what) => AuthError::Conflict(what),
            StoreError::Unexpected(err) => AuthError::Store(err),
        }
    }
}

impl AuthError {
    /// Stable label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::InvalidRequest(_) => "invalid_request",
            AuthError::InvalidFormat(_) => "invalid_format",
            AuthError::InvalidPattern(_) => "invalid_pattern",
            AuthError::Unauthorized => "unauthorized",
            AuthError::NotFound(_) => "not_found",
            AuthError::NamespaceNotFound(_) => "namespace_not_found",
            AuthError::NotMember { .. } => "not_member",
            AuthError::DuplicateFingerprint(_) => "duplicate_fingerprint",
            AuthError::Conflict(_) => "conflict",
            AuthError::Store(_) => "store",
            AuthError::Cache(_) => "cache",
            AuthError::Signing(_) => "signing",
            AuthError::Crypto(_) => "crypto",
            AuthError::Cancelled => "cancelled",
            AuthError::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("missing required setting {0}")]
    MissingSetting(&'static str),
    #[error("invalid configuration: {0:#}")]
    Config(#[from] anyhow::Error),
    #[error("read key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid signing key material: {0}")]
    KeyMaterial(#[source] jsonwebtoken::errors::Error),
    #[error("signing private key does not match the public key")]
    KeyMismatch,
    #[error("dedup cache: {0}")]
    Cache(#[from] CacheError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_auth_errors() {
        assert!(matches!(
            AuthError::from(StoreError::NotFound("user u1".into())),
            AuthError::NotFound(what) if what == "user u1"
        ));
        assert!(matches!(
            AuthError::from(StoreError::Conflict("dup".into())),
            AuthError::Conflict(_)
        ));
        let unexpected = AuthError::from(StoreError::Unexpected(anyhow::anyhow!("disk on fire")));
        assert_eq!(unexpected.kind(), "store");
        assert!(unexpected.to_string().contains("disk on fire"));
    }

    #[test]
    fn not_member_display_names_both_sides() {
        let err = AuthError::NotMember {
            tenant_id: "t1".into(),
            user: "u1".into(),
        };
        assert_eq!(err.to_string(), "user u1 is not a member of namespace t1");
    }
}
