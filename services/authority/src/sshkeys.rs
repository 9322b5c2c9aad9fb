//! SSH public key registry and challenge keys.
//!
//! # Purpose
//! Owners register OpenSSH public keys for their namespace, optionally
//! restricted to devices whose name matches a hostname pattern. The registry
//! also holds server-generated RSA keys used to answer public-key challenges.
//!
//! # Key invariants
//! - A fingerprint is registered at most once per tenant; the same key may be
//!   registered in several tenants.
//! - Stored hostname patterns always compile.
//! - Pattern evaluation is an unanchored search: `edge` matches `my-edge-1`.
use crate::auth::namespace::NamespaceGuard;
use crate::context::RequestContext;
use crate::error::{AuthError, AuthResult};
use crate::model::{NewPublicKey, PrivateKey, PublicKey, PublicKeyUpdate, UserId};
use crate::store::CredentialStore;
use chrono::Utc;
use regex::Regex;
use shellward_crypto::{DEFAULT_CHALLENGE_KEY_BITS, parse_authorized_key};
use std::sync::Arc;

#[derive(Clone)]
pub struct PublicKeyRegistry {
    store: Arc<dyn CredentialStore>,
    guard: NamespaceGuard,
    challenge_key_bits: usize,
}

impl PublicKeyRegistry {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self::with_challenge_key_bits(store, DEFAULT_CHALLENGE_KEY_BITS)
    }

    pub fn with_challenge_key_bits(store: Arc<dyn CredentialStore>, bits: usize) -> Self {
        Self {
            guard: NamespaceGuard::new(store.clone()),
            store,
            challenge_key_bits: bits,
        }
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        key: NewPublicKey,
        owner: &UserId,
    ) -> AuthResult<PublicKey> {
        self.guard.is_owner(ctx, &key.tenant_id, owner).await?;

        let parsed =
            parse_authorized_key(&key.data).map_err(|err| AuthError::InvalidFormat(err.to_string()))?;
        let hostname = normalize_pattern(key.hostname)?;

        let record = PublicKey {
            data: key.data,
            fingerprint: parsed.fingerprint,
            tenant_id: key.tenant_id,
            name: key.name,
            hostname,
            created_at: Utc::now(),
        };
        let fingerprint = record.fingerprint.clone();
        let created = match ctx.run(self.store.insert_public_key_if_absent(record)).await {
            Err(AuthError::Conflict(_)) => return Err(AuthError::DuplicateFingerprint(fingerprint)),
            other => other?,
        };
        metrics::counter!("shellward_public_keys_total", "op" => "created").increment(1);
        tracing::info!(
            tenant_id = %created.tenant_id,
            fingerprint = %created.fingerprint,
            "public key registered"
        );
        Ok(created)
    }

    pub async fn get(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        fingerprint: &str,
    ) -> AuthResult<PublicKey> {
        ctx.run(self.store.public_key(tenant_id, fingerprint)).await
    }

    pub async fn list(&self, ctx: &RequestContext, tenant_id: &str) -> AuthResult<Vec<PublicKey>> {
        ctx.run(self.store.list_public_keys(tenant_id)).await
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        fingerprint: &str,
        update: PublicKeyUpdate,
        owner: &UserId,
    ) -> AuthResult<PublicKey> {
        self.guard.is_owner(ctx, tenant_id, owner).await?;
        let update = PublicKeyUpdate {
            hostname: normalize_pattern(update.hostname)?,
            ..update
        };
        let updated = ctx
            .run(self.store.update_public_key(tenant_id, fingerprint, update))
            .await?;
        metrics::counter!("shellward_public_keys_total", "op" => "updated").increment(1);
        Ok(updated)
    }

    pub async fn delete(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        fingerprint: &str,
        owner: &UserId,
    ) -> AuthResult<()> {
        self.guard.is_owner(ctx, tenant_id, owner).await?;
        ctx.run(self.store.delete_public_key(tenant_id, fingerprint))
            .await?;
        metrics::counter!("shellward_public_keys_total", "op" => "deleted").increment(1);
        tracing::info!(tenant_id, fingerprint, "public key deleted");
        Ok(())
    }

    /// Whether `key` may be used to log into a device named `device_name`.
    pub fn evaluate_hostname(key: &PublicKey, device_name: &str) -> AuthResult<bool> {
        match key.hostname.as_deref() {
            None | Some("") => Ok(true),
            Some(pattern) => Ok(compile(pattern)?.is_match(device_name)),
        }
    }

    /// Generate and store a server-held RSA key, keyed by its legacy MD5
    /// fingerprint.
    pub async fn generate_challenge_keypair(&self, ctx: &RequestContext) -> AuthResult<PrivateKey> {
        ctx.check()?;
        let bits = self.challenge_key_bits;
        // Keygen runs on the blocking pool. A cancelled request returns at
        // once, but the blocking task cannot be interrupted and finishes in the
        // background; its key is dropped unstored.
        let task =
            tokio::task::spawn_blocking(move || shellward_crypto::generate_challenge_keypair(bits));
        let keypair = ctx
            .run(async move {
                match task.await {
                    Ok(result) => result.map_err(AuthError::from),
                    Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                    Err(_) => Err(AuthError::Cancelled),
                }
            })
            .await?;

        let key = PrivateKey {
            fingerprint: keypair.fingerprint,
            data: keypair.private_key_pem,
            created_at: Utc::now(),
        };
        let stored = ctx.run(self.store.insert_private_key(key)).await?;
        tracing::info!(fingerprint = %stored.fingerprint, bits, "challenge key generated");
        Ok(stored)
    }

    /// PKCS#1 v1.5 signature over SHA-256(`data`), standard base64.
    pub async fn sign_challenge(
        &self,
        ctx: &RequestContext,
        fingerprint: &str,
        data: &[u8],
    ) -> AuthResult<String> {
        let key = ctx.run(self.store.private_key(fingerprint)).await?;
        Ok(shellward_crypto::sign_challenge(&key.data, data)?)
    }
}

fn compile(pattern: &str) -> AuthResult<Regex> {
    Regex::new(pattern).map_err(|err| AuthError::InvalidPattern(err.to_string()))
}

/// Empty patterns mean "no restriction"; anything else must compile.
fn normalize_pattern(pattern: Option<String>) -> AuthResult<Option<String>> {
    match pattern {
        Some(pattern) if !pattern.is_empty() => {
            compile(&pattern)?;
            Ok(Some(pattern))
        }
        _ => Ok(None),
    }
}
