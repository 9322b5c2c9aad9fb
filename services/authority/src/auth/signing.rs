//! RS256 signing authority for every token the platform issues.
//!
//! # Purpose
//! Holds the RSA keypair loaded at startup and signs/verifies `AuthClaims` as
//! RS256 JWTs. Device, user, and API-token credentials all go through the same
//! authority so any validator holding the public key can check them.
//!
//! # Key invariants
//! - Tokens are always RS256; no other algorithm is accepted on verify.
//! - `exp` is enforced when present and not required when absent. Device and
//!   API-token credentials carry no expiry.
//! - The private and public halves are checked against each other with a probe
//!   signature before the authority is handed out.
//!
//! # Concurrency model
//! Key material is immutable after construction and shared through an `Arc`;
//! cloning the authority is cheap and it is safe to use from any task.
//!
//! # Security boundary
//! The private key never leaves this module. `public_key_pem` exposes only the
//! verification half.
//!
//! # Common pitfalls
//! - Loading a public key that belongs to another keypair. Construction fails
//!   with `StartupError::KeyMismatch` instead of issuing tokens nobody can
//!   verify.
use crate::error::{AuthError, AuthResult, StartupError};
use crate::model::AuthClaims;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Filesystem locations of the PEM encoded signing keypair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKeyPaths {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    public_pem: String,
}

#[derive(Clone)]
pub struct SigningAuthority {
    keys: Arc<SigningKeys>,
}

impl std::fmt::Debug for SigningAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningAuthority").finish_non_exhaustive()
    }
}

impl SigningAuthority {
    /// Build an authority from PKCS#1 or PKCS#8 PEM RSA material.
    ///
    /// # Errors
    /// - `StartupError::KeyMaterial` if either half fails to parse or the
    ///   private key cannot sign.
    /// - `StartupError::KeyMismatch` if the public key cannot verify a token
    ///   signed by the private key.
    pub fn from_pem(private_pem: &[u8], public_pem: &[u8]) -> Result<Self, StartupError> {
        let encoding = EncodingKey::from_rsa_pem(private_pem).map_err(StartupError::KeyMaterial)?;
        let decoding = DecodingKey::from_rsa_pem(public_pem).map_err(StartupError::KeyMaterial)?;

        let probe = AuthClaims::device("signing-probe", now());
        let token = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &probe, &encoding)
            .map_err(StartupError::KeyMaterial)?;
        jsonwebtoken::decode::<AuthClaims>(&token, &decoding, &validation())
            .map_err(|_| StartupError::KeyMismatch)?;

        Ok(Self {
            keys: Arc::new(SigningKeys {
                encoding,
                decoding,
                public_pem: String::from_utf8_lossy(public_pem).into_owned(),
            }),
        })
    }

    /// Read both halves from disk and build the authority.
    pub fn load(paths: &SigningKeyPaths) -> Result<Self, StartupError> {
        let private_pem = read_key(&paths.private_key)?;
        let public_pem = read_key(&paths.public_key)?;
        let authority = Self::from_pem(&private_pem, &public_pem)?;
        tracing::info!(
            public_key = %paths.public_key.display(),
            "signing keypair loaded"
        );
        Ok(authority)
    }

    pub fn sign(&self, claims: &AuthClaims) -> AuthResult<String> {
        jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            claims,
            &self.keys.encoding,
        )
        .map_err(AuthError::Signing)
    }

    /// Verify signature and expiry; any failure is reported as `Unauthorized`.
    pub fn verify(&self, token: &str) -> AuthResult<AuthClaims> {
        jsonwebtoken::decode::<AuthClaims>(token, &self.keys.decoding, &validation())
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!(error = %err, "token verification failed");
                AuthError::Unauthorized
            })
    }

    /// PEM encoded verification key, as loaded.
    pub fn public_key_pem(&self) -> &str {
        &self.keys.public_pem
    }
}

fn read_key(path: &Path) -> Result<Vec<u8>, StartupError> {
    std::fs::read(path).map_err(|source| StartupError::KeyFile {
        path: path.to_path_buf(),
        source,
    })
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.required_spec_claims = HashSet::new();
    validation.validate_exp = true;
    validation
}

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
