//! In-memory implementation of the credential store.
//!
//! # Purpose
//! Implements `CredentialStore` with `HashMap`s guarded by `tokio::sync::RwLock`.
//! It backs local development and the test suites; nothing survives a restart.
//!
//! # Consistency
//! - Conditional writes run under a single write lock, so insert-if-absent and
//!   per-token updates are atomic within the process.
//! - When two maps are locked together the order is always devices, then
//!   sessions.
//! - API tokens live inside their namespace record, keyed by token id.
//!
//! # Metrics
//! Gauges track record counts the same way a durable backend would report them.
use super::{CredentialStore, StoreError, StoreResult};
use crate::model::{
    ApiToken, Device, DeviceStatus, DeviceUpsert, Namespace, PrivateKey, PublicKey,
    PublicKeyUpdate, Session, User, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct NamespaceRecord {
    namespace: Namespace,
    api_tokens: BTreeMap<String, ApiToken>,
}

#[derive(Default)]
pub struct InMemoryStore {
    users: Arc<RwLock<HashMap<UserId, User>>>,
    /// Keyed by `tenant_id`.
    namespaces: Arc<RwLock<HashMap<String, NamespaceRecord>>>,
    /// Keyed by device uid.
    devices: Arc<RwLock<HashMap<String, Device>>>,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    /// Keyed by `(tenant_id, fingerprint)`.
    public_keys: Arc<RwLock<HashMap<(String, String), PublicKey>>>,
    private_keys: Arc<RwLock<HashMap<String, PrivateKey>>>,
    device_upserts: Arc<AtomicU64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of device upserts served since construction.
    pub fn device_upserts(&self) -> u64 {
        self.device_upserts.load(Ordering::Relaxed)
    }
}

fn not_found(kind: &str, key: impl std::fmt::Display) -> StoreError {
    StoreError::NotFound(format!("{kind} {key}"))
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn user_by_id(&self, id: &UserId) -> StoreResult<User> {
        self.users
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("user", id))
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<User> {
        let username = username.to_lowercase();
        self.users
            .read()
            .await
            .values()
            .find(|user| user.username == username)
            .cloned()
            .ok_or_else(|| not_found("user", &username))
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<User> {
        let email = email.to_lowercase();
        self.users
            .read()
            .await
            .values()
            .find(|user| user.email == email)
            .cloned()
            .ok_or_else(|| not_found("user with email", &email))
    }

    async fn insert_user(&self, mut user: User) -> StoreResult<User> {
        user.username = user.username.to_lowercase();
        user.email = user.email.to_lowercase();
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {} exists", user.id)));
        }
        if users.values().any(|existing| existing.username == user.username) {
            return Err(StoreError::Conflict(format!(
                "username {} taken",
                user.username
            )));
        }
        users.insert(user.id.clone(), user.clone());
        metrics::gauge!("shellward_users_total").set(users.len() as f64);
        Ok(user)
    }

    async fn set_user_password(&self, id: &UserId, digest: &str) -> StoreResult<()> {
        let mut users = self.users.write().await;
        let user = users.get_mut(id).ok_or_else(|| not_found("user", id))?;
        user.password = digest.to_string();
        Ok(())
    }

    async fn namespace(&self, tenant_id: &str) -> StoreResult<Namespace> {
        self.namespaces
            .read()
            .await
            .get(tenant_id)
            .map(|record| record.namespace.clone())
            .ok_or_else(|| not_found("namespace", tenant_id))
    }

    async fn first_namespace_of_member(&self, user: &UserId) -> StoreResult<Namespace> {
        self.namespaces
            .read()
            .await
            .values()
            .map(|record| &record.namespace)
            .filter(|namespace| namespace.members.contains(user))
            .min_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.tenant_id.cmp(&b.tenant_id))
            })
            .cloned()
            .ok_or_else(|| not_found("namespace with member", user))
    }

    async fn insert_namespace(&self, mut namespace: Namespace) -> StoreResult<Namespace> {
        namespace.members.insert(namespace.owner.clone());
        namespace.devices_count = 0;
        let mut namespaces = self.namespaces.write().await;
        if namespaces.contains_key(&namespace.tenant_id) {
            return Err(StoreError::Conflict(format!(
                "namespace {} exists",
                namespace.tenant_id
            )));
        }
        namespaces.insert(
            namespace.tenant_id.clone(),
            NamespaceRecord {
                namespace: namespace.clone(),
                api_tokens: BTreeMap::new(),
            },
        );
        metrics::gauge!("shellward_namespaces_total").set(namespaces.len() as f64);
        Ok(namespace)
    }

    async fn add_member(&self, tenant_id: &str, user: &UserId) -> StoreResult<Namespace> {
        let mut namespaces = self.namespaces.write().await;
        let record = namespaces
            .get_mut(tenant_id)
            .ok_or_else(|| not_found("namespace", tenant_id))?;
        if !record.namespace.members.insert(user.clone()) {
            return Err(StoreError::Conflict(format!(
                "{user} already a member of {tenant_id}"
            )));
        }
        Ok(record.namespace.clone())
    }

    async fn remove_member(&self, tenant_id: &str, user: &UserId) -> StoreResult<Namespace> {
        let mut namespaces = self.namespaces.write().await;
        let record = namespaces
            .get_mut(tenant_id)
            .ok_or_else(|| not_found("namespace", tenant_id))?;
        if !record.namespace.members.remove(user) {
            return Err(not_found("member", user));
        }
        Ok(record.namespace.clone())
    }

    async fn set_session_record(&self, tenant_id: &str, enabled: bool) -> StoreResult<()> {
        let mut namespaces = self.namespaces.write().await;
        let record = namespaces
            .get_mut(tenant_id)
            .ok_or_else(|| not_found("namespace", tenant_id))?;
        record.namespace.settings.session_record = enabled;
        Ok(())
    }

    async fn count_accepted_devices(&self, tenant_id: &str) -> StoreResult<u64> {
        let count = self
            .devices
            .read()
            .await
            .values()
            .filter(|device| {
                device.tenant_id == tenant_id && device.status == DeviceStatus::Accepted
            })
            .count();
        Ok(count as u64)
    }

    async fn upsert_device(&self, upsert: DeviceUpsert) -> StoreResult<Device> {
        self.device_upserts.fetch_add(1, Ordering::Relaxed);
        let mut devices = self.devices.write().await;
        let device = devices
            .entry(upsert.uid.clone())
            .and_modify(|device| {
                device.identity = upsert.identity.clone();
                device.info = upsert.info.clone();
                device.public_key = upsert.public_key.clone();
                device.tenant_id = upsert.tenant_id.clone();
                device.last_seen = upsert.last_seen;
            })
            .or_insert_with(|| Device {
                uid: upsert.uid.clone(),
                name: upsert.name.clone(),
                identity: upsert.identity.clone(),
                info: upsert.info.clone(),
                public_key: upsert.public_key.clone(),
                tenant_id: upsert.tenant_id.clone(),
                status: DeviceStatus::Pending,
                online: false,
                last_seen: upsert.last_seen,
                created_at: upsert.last_seen,
            })
            .clone();
        metrics::gauge!("shellward_devices_total").set(devices.len() as f64);
        Ok(device)
    }

    async fn device(&self, tenant_id: &str, uid: &str) -> StoreResult<Device> {
        self.devices
            .read()
            .await
            .get(uid)
            .filter(|device| device.tenant_id == tenant_id)
            .cloned()
            .ok_or_else(|| not_found("device", uid))
    }

    async fn set_device_online(&self, uid: &str, online: bool) -> StoreResult<()> {
        let mut devices = self.devices.write().await;
        let device = devices.get_mut(uid).ok_or_else(|| not_found("device", uid))?;
        device.online = online;
        Ok(())
    }

    async fn set_device_status(
        &self,
        tenant_id: &str,
        uid: &str,
        status: DeviceStatus,
    ) -> StoreResult<Device> {
        let mut devices = self.devices.write().await;
        let device = devices
            .get_mut(uid)
            .filter(|device| device.tenant_id == tenant_id)
            .ok_or_else(|| not_found("device", uid))?;
        device.status = status;
        Ok(device.clone())
    }

    async fn delete_device(&self, tenant_id: &str, uid: &str) -> StoreResult<()> {
        let mut devices = self.devices.write().await;
        match devices.get(uid) {
            Some(device) if device.tenant_id == tenant_id => {}
            _ => return Err(not_found("device", uid)),
        }
        devices.remove(uid);
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, session| session.device_uid != uid);
        metrics::gauge!("shellward_devices_total").set(devices.len() as f64);
        Ok(())
    }

    async fn insert_session(&self, session: Session) -> StoreResult<Session> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.uid) {
            return Err(StoreError::Conflict(format!("session {} exists", session.uid)));
        }
        sessions.insert(session.uid.clone(), session.clone());
        Ok(session)
    }

    async fn session(&self, uid: &str) -> StoreResult<Session> {
        self.sessions
            .read()
            .await
            .get(uid)
            .cloned()
            .ok_or_else(|| not_found("session", uid))
    }

    async fn touch_session(&self, uid: &str, seen_at: DateTime<Utc>) -> StoreResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(uid)
            .ok_or_else(|| not_found("session", uid))?;
        if !session.closed {
            session.last_seen = seen_at;
        }
        Ok(())
    }

    async fn public_key(&self, tenant_id: &str, fingerprint: &str) -> StoreResult<PublicKey> {
        self.public_keys
            .read()
            .await
            .get(&(tenant_id.to_string(), fingerprint.to_string()))
            .cloned()
            .ok_or_else(|| not_found("public key", fingerprint))
    }

    async fn list_public_keys(&self, tenant_id: &str) -> StoreResult<Vec<PublicKey>> {
        let mut keys: Vec<PublicKey> = self
            .public_keys
            .read()
            .await
            .values()
            .filter(|key| key.tenant_id == tenant_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        Ok(keys)
    }

    async fn insert_public_key_if_absent(&self, key: PublicKey) -> StoreResult<PublicKey> {
        let mut keys = self.public_keys.write().await;
        let id = (key.tenant_id.clone(), key.fingerprint.clone());
        if keys.contains_key(&id) {
            return Err(StoreError::Conflict(format!(
                "public key {} exists in {}",
                key.fingerprint, key.tenant_id
            )));
        }
        keys.insert(id, key.clone());
        metrics::gauge!("shellward_public_keys_stored").set(keys.len() as f64);
        Ok(key)
    }

    async fn update_public_key(
        &self,
        tenant_id: &str,
        fingerprint: &str,
        update: PublicKeyUpdate,
    ) -> StoreResult<PublicKey> {
        let mut keys = self.public_keys.write().await;
        let key = keys
            .get_mut(&(tenant_id.to_string(), fingerprint.to_string()))
            .ok_or_else(|| not_found("public key", fingerprint))?;
        key.name = update.name;
        key.hostname = update.hostname;
        Ok(key.clone())
    }

    async fn delete_public_key(&self, tenant_id: &str, fingerprint: &str) -> StoreResult<()> {
        let mut keys = self.public_keys.write().await;
        keys.remove(&(tenant_id.to_string(), fingerprint.to_string()))
            .ok_or_else(|| not_found("public key", fingerprint))?;
        metrics::gauge!("shellward_public_keys_stored").set(keys.len() as f64);
        Ok(())
    }

    async fn insert_private_key(&self, key: PrivateKey) -> StoreResult<PrivateKey> {
        let mut keys = self.private_keys.write().await;
        if keys.contains_key(&key.fingerprint) {
            return Err(StoreError::Conflict(format!(
                "private key {} exists",
                key.fingerprint
            )));
        }
        keys.insert(key.fingerprint.clone(), key.clone());
        Ok(key)
    }

    async fn private_key(&self, fingerprint: &str) -> StoreResult<PrivateKey> {
        self.private_keys
            .read()
            .await
            .get(fingerprint)
            .cloned()
            .ok_or_else(|| not_found("private key", fingerprint))
    }

    async fn list_api_tokens(&self, tenant_id: &str) -> StoreResult<Vec<ApiToken>> {
        let namespaces = self.namespaces.read().await;
        let record = namespaces
            .get(tenant_id)
            .ok_or_else(|| not_found("namespace", tenant_id))?;
        Ok(record.api_tokens.values().cloned().collect())
    }

    async fn insert_api_token_if_absent(&self, token: ApiToken) -> StoreResult<ApiToken> {
        let mut namespaces = self.namespaces.write().await;
        let record = namespaces
            .get_mut(&token.tenant_id)
            .ok_or_else(|| not_found("namespace", &token.tenant_id))?;
        if record.api_tokens.contains_key(&token.id) {
            return Err(StoreError::Conflict(format!("api token {} exists", token.id)));
        }
        record.api_tokens.insert(token.id.clone(), token.clone());
        Ok(token)
    }

    async fn api_token(&self, tenant_id: &str, id: &str) -> StoreResult<ApiToken> {
        self.namespaces
            .read()
            .await
            .get(tenant_id)
            .and_then(|record| record.api_tokens.get(id))
            .cloned()
            .ok_or_else(|| not_found("api token", id))
    }

    async fn set_api_token_read_only(
        &self,
        tenant_id: &str,
        id: &str,
        read_only: bool,
    ) -> StoreResult<ApiToken> {
        let mut namespaces = self.namespaces.write().await;
        let token = namespaces
            .get_mut(tenant_id)
            .and_then(|record| record.api_tokens.get_mut(id))
            .ok_or_else(|| not_found("api token", id))?;
        token.read_only = read_only;
        Ok(token.clone())
    }

    async fn delete_api_token(&self, tenant_id: &str, id: &str) -> StoreResult<()> {
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .get_mut(tenant_id)
            .and_then(|record| record.api_tokens.remove(id))
            .map(|_| ())
            .ok_or_else(|| not_found("api token", id))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeviceIdentity, DeviceInfo};
    use chrono::Duration;

    fn upsert(uid: &str, tenant: &str, name: &str) -> DeviceUpsert {
        DeviceUpsert {
            uid: uid.to_string(),
            name: name.to_string(),
            identity: DeviceIdentity {
                mac: "aa:bb:cc:dd:ee:ff".to_string(),
            },
            info: DeviceInfo::default(),
            public_key: "pk".to_string(),
            tenant_id: tenant.to_string(),
            last_seen: Utc::now(),
        }
    }

    fn session(uid: &str, device: &str, closed: bool) -> Session {
        Session {
            uid: uid.to_string(),
            device_uid: device.to_string(),
            tenant_id: "t1".to_string(),
            last_seen: Utc::now() - Duration::hours(1),
            closed,
        }
    }

    #[tokio::test]
    async fn upsert_keeps_name_and_status_of_existing_device() {
        let store = InMemoryStore::new();
        store.upsert_device(upsert("d1", "t1", "edge-1")).await.expect("insert");
        store
            .set_device_status("t1", "d1", DeviceStatus::Accepted)
            .await
            .expect("status");

        let mut again = upsert("d1", "t1", "renamed");
        again.public_key = "pk2".to_string();
        let device = store.upsert_device(again).await.expect("upsert");
        assert_eq!(device.name, "edge-1");
        assert_eq!(device.status, DeviceStatus::Accepted);
        assert_eq!(device.public_key, "pk2");
        assert_eq!(store.device_upserts(), 2);
        assert_eq!(store.count_accepted_devices("t1").await.expect("count"), 1);
    }

    #[tokio::test]
    async fn delete_device_cascades_to_sessions_and_respects_tenant() {
        let store = InMemoryStore::new();
        store.upsert_device(upsert("d1", "t1", "edge-1")).await.expect("insert");
        store.insert_session(session("s1", "d1", false)).await.expect("session");
        store.insert_session(session("s2", "other", false)).await.expect("session");

        assert!(matches!(
            store.delete_device("t2", "d1").await,
            Err(StoreError::NotFound(_))
        ));
        store.delete_device("t1", "d1").await.expect("delete");
        assert!(matches!(store.session("s1").await, Err(StoreError::NotFound(_))));
        assert!(store.session("s2").await.is_ok());
    }

    #[tokio::test]
    async fn touch_skips_closed_sessions() {
        let store = InMemoryStore::new();
        let open = store.insert_session(session("open", "d1", false)).await.expect("open");
        let closed = store
            .insert_session(session("closed", "d1", true))
            .await
            .expect("closed");
        let now = Utc::now();
        store.touch_session("open", now).await.expect("touch open");
        store.touch_session("closed", now).await.expect("touch closed");

        assert!(store.session("open").await.expect("open").last_seen > open.last_seen);
        assert_eq!(
            store.session("closed").await.expect("closed").last_seen,
            closed.last_seen
        );
        assert!(matches!(
            store.touch_session("missing", now).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn namespace_insert_adds_owner_and_rejects_duplicates() {
        let store = InMemoryStore::new();
        let mut namespace = Namespace::new("t1", "edge", UserId::new("owner"));
        namespace.members = Default::default();
        let stored = store.insert_namespace(namespace.clone()).await.expect("insert");
        assert!(stored.members.contains(&UserId::new("owner")));
        assert!(matches!(
            store.insert_namespace(namespace).await,
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            store.add_member("t1", &UserId::new("owner")).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn first_namespace_is_oldest_membership() {
        let store = InMemoryStore::new();
        let user = UserId::new("u1");
        let mut newer = Namespace::new("newer", "b", user.clone());
        newer.created_at = Utc::now();
        let mut older = Namespace::new("older", "a", UserId::new("someone"));
        older.created_at = newer.created_at - Duration::days(1);
        store.insert_namespace(newer).await.expect("newer");
        store.insert_namespace(older).await.expect("older");
        store.add_member("older", &user).await.expect("member");

        let first = store.first_namespace_of_member(&user).await.expect("first");
        assert_eq!(first.tenant_id, "older");
        assert!(matches!(
            store.first_namespace_of_member(&UserId::new("nobody")).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn api_token_insert_is_conditional_and_update_is_per_token() {
        let store = InMemoryStore::new();
        store
            .insert_namespace(Namespace::new("t1", "edge", UserId::new("owner")))
            .await
            .expect("namespace");
        for id in ["a", "b"] {
            store
                .insert_api_token_if_absent(ApiToken {
                    id: id.to_string(),
                    tenant_id: "t1".to_string(),
                    read_only: true,
                })
                .await
                .expect("insert");
        }
        let duplicate = ApiToken {
            id: "a".to_string(),
            tenant_id: "t1".to_string(),
            read_only: false,
        };
        assert!(matches!(
            store.insert_api_token_if_absent(duplicate).await,
            Err(StoreError::Conflict(_))
        ));

        store.set_api_token_read_only("t1", "a", false).await.expect("update");
        assert!(!store.api_token("t1", "a").await.expect("a").read_only);
        assert!(store.api_token("t1", "b").await.expect("b").read_only);
        assert!(matches!(
            store.insert_api_token_if_absent(ApiToken {
                id: "x".to_string(),
                tenant_id: "missing".to_string(),
                read_only: true,
            })
            .await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn usernames_are_stored_lowercase() {
        let store = InMemoryStore::new();
        store
            .insert_user(User {
                id: UserId::new("u1"),
                username: "Alice".to_string(),
                email: "Alice@Example.com".to_string(),
                name: "Alice".to_string(),
                password: "digest".to_string(),
            })
            .await
            .expect("insert");
        assert_eq!(store.user_by_username("ALICE").await.expect("user").id.as_str(), "u1");
        assert!(store.user_by_email("alice@example.com").await.is_ok());
        assert_eq!(store.backend_name(), "memory");
        store.health_check().await.expect("health");
    }
}
