//! Credential store contract.
//!
//! # Purpose
//! The authority never talks to a database directly; every service goes through
//! `CredentialStore`. Conditional writes (insert-if-absent, per-token update)
//! are part of the contract so callers never need check-then-act sequences.
//!
//! # Errors
//! Every method reports a missing record as `StoreError::NotFound`, distinct
//! from conflicts and backend failures.
use crate::model::{
    ApiToken, Device, DeviceStatus, DeviceUpsert, Namespace, PrivateKey, PublicKey,
    PublicKeyUpdate, Session, User, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn user_by_id(&self, id: &UserId) -> StoreResult<User>;
    async fn user_by_username(&self, username: &str) -> StoreResult<User>;
    async fn user_by_email(&self, email: &str) -> StoreResult<User>;
    async fn insert_user(&self, user: User) -> StoreResult<User>;
    async fn set_user_password(&self, id: &UserId, digest: &str) -> StoreResult<()>;

    async fn namespace(&self, tenant_id: &str) -> StoreResult<Namespace>;
    /// Oldest namespace the user belongs to.
    async fn first_namespace_of_member(&self, user: &UserId) -> StoreResult<Namespace>;
    /// Insert a namespace; its owner is always added to the member set.
    async fn insert_namespace(&self, namespace: Namespace) -> StoreResult<Namespace>;
    async fn add_member(&self, tenant_id: &str, user: &UserId) -> StoreResult<Namespace>;
    async fn remove_member(&self, tenant_id: &str, user: &UserId) -> StoreResult<Namespace>;
    async fn set_session_record(&self, tenant_id: &str, enabled: bool) -> StoreResult<()>;
    async fn count_accepted_devices(&self, tenant_id: &str) -> StoreResult<u64>;

    /// Insert or refresh a device. Last write wins per uid; an existing device
    /// keeps its name and status.
    async fn upsert_device(&self, device: DeviceUpsert) -> StoreResult<Device>;
    async fn device(&self, tenant_id: &str, uid: &str) -> StoreResult<Device>;
    async fn set_device_online(&self, uid: &str, online: bool) -> StoreResult<()>;
    async fn set_device_status(
        &self,
        tenant_id: &str,
        uid: &str,
        status: DeviceStatus,
    ) -> StoreResult<Device>;
    /// Delete a device and every session that references it.
    async fn delete_device(&self, tenant_id: &str, uid: &str) -> StoreResult<()>;

    async fn insert_session(&self, session: Session) -> StoreResult<Session>;
    async fn session(&self, uid: &str) -> StoreResult<Session>;
    /// Refresh `last_seen` of an open session. Closed sessions are left as-is.
    async fn touch_session(&self, uid: &str, seen_at: DateTime<Utc>) -> StoreResult<()>;

    async fn public_key(&self, tenant_id: &str, fingerprint: &str) -> StoreResult<PublicKey>;
    /// Registrations of one tenant, oldest first.
    async fn list_public_keys(&self, tenant_id: &str) -> StoreResult<Vec<PublicKey>>;
    /// `Conflict` when `(tenant_id, fingerprint)` is already registered.
    async fn insert_public_key_if_absent(&self, key: PublicKey) -> StoreResult<PublicKey>;
    async fn update_public_key(
        &self,
        tenant_id: &str,
        fingerprint: &str,
        update: PublicKeyUpdate,
    ) -> StoreResult<PublicKey>;
    async fn delete_public_key(&self, tenant_id: &str, fingerprint: &str) -> StoreResult<()>;

    async fn insert_private_key(&self, key: PrivateKey) -> StoreResult<PrivateKey>;
    async fn private_key(&self, fingerprint: &str) -> StoreResult<PrivateKey>;

    async fn list_api_tokens(&self, tenant_id: &str) -> StoreResult<Vec<ApiToken>>;
    /// `Conflict` when `(tenant_id, id)` already exists.
    async fn insert_api_token_if_absent(&self, token: ApiToken) -> StoreResult<ApiToken>;
    async fn api_token(&self, tenant_id: &str, id: &str) -> StoreResult<ApiToken>;
    async fn set_api_token_read_only(
        &self,
        tenant_id: &str,
        id: &str,
        read_only: bool,
    ) -> StoreResult<ApiToken>;
    async fn delete_api_token(&self, tenant_id: &str, id: &str) -> StoreResult<()>;

    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}
