//! Device identity resolution and device token issuance.
//!
//! # Purpose
//! A device proves nothing beyond what it reports: hostname, MAC, public key,
//! and tenant. Those four values are hashed into the device fingerprint, which
//! becomes both the device uid and the token subject.
//!
//! # Flow
//! 1. Fingerprint the identity payload.
//! 2. A dedup cache hit answers immediately with the cached name/namespace.
//! 3. Otherwise validate, resolve the namespace, upsert the device, mark it
//!    online, refresh reported sessions, and populate the cache.
//!
//! Session refreshes and cache population are best effort: failures are logged
//! and never fail the authentication.
use crate::auth::namespace::{NamespaceGuard, namespace_missing};
use crate::auth::signing::{SigningAuthority, now};
use crate::cache::{CachedDevice, DedupCache};
use crate::context::RequestContext;
use crate::error::{AuthError, AuthResult};
use crate::model::{
    AuthClaims, Device, DeviceIdentity, DeviceInfo, DeviceStatus, DeviceUpsert, UserId,
};
use crate::store::CredentialStore;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};

const MAX_HOSTNAME_LEN: usize = 253;

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)*$")
        .expect("hostname pattern compiles")
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAuthRequest {
    #[serde(default)]
    pub hostname: Option<String>,
    pub identity: DeviceIdentity,
    pub public_key: String,
    pub tenant_id: String,
    #[serde(default)]
    pub info: DeviceInfo,
    /// Session uids the device reports as still open.
    #[serde(default)]
    pub sessions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAuthResponse {
    pub uid: String,
    pub token: String,
    pub name: String,
    /// Namespace display name.
    pub namespace: String,
}

/// Identity fields in hashing order.
#[derive(Serialize)]
struct IdentityPayload<'a> {
    hostname: &'a str,
    identity: &'a DeviceIdentity,
    public_key: &'a str,
    tenant_id: &'a str,
}

/// Hex SHA-256 over the canonical JSON of the reported identity.
///
/// `info` and `sessions` do not participate.
pub fn device_fingerprint(req: &DeviceAuthRequest) -> AuthResult<String> {
    let payload = IdentityPayload {
        hostname: req.hostname.as_deref().unwrap_or_default(),
        identity: &req.identity,
        public_key: &req.public_key,
        tenant_id: &req.tenant_id,
    };
    let bytes = serde_json::to_vec(&payload)
        .map_err(|err| AuthError::InvalidRequest(format!("encode device identity: {err}")))?;
    Ok(shellward_crypto::sha256_hex(&bytes))
}

fn validate(req: &DeviceAuthRequest) -> AuthResult<()> {
    if req.tenant_id.trim().is_empty() {
        return Err(AuthError::InvalidRequest("tenant_id is required".into()));
    }
    if req.public_key.trim().is_empty() {
        return Err(AuthError::InvalidRequest("public_key is required".into()));
    }
    if req.identity.mac.trim().is_empty() {
        return Err(AuthError::InvalidRequest("identity.mac is required".into()));
    }
    if let Some(hostname) = req.hostname.as_deref()
        && !hostname.is_empty()
        && (hostname.len() > MAX_HOSTNAME_LEN || !HOSTNAME.is_match(hostname))
    {
        return Err(AuthError::InvalidRequest(format!(
            "invalid hostname: {hostname}"
        )));
    }
    Ok(())
}

fn is_abort(err: &AuthError) -> bool {
    matches!(err, AuthError::Cancelled | AuthError::DeadlineExceeded)
}

#[derive(Clone)]
pub struct DeviceResolver {
    store: Arc<dyn CredentialStore>,
    cache: Arc<dyn DedupCache>,
    signer: SigningAuthority,
    guard: NamespaceGuard,
}

impl DeviceResolver {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn DedupCache>,
        signer: SigningAuthority,
    ) -> Self {
        let guard = NamespaceGuard::new(store.clone());
        Self {
            store,
            cache,
            signer,
            guard,
        }
    }

    pub async fn authenticate(
        &self,
        ctx: &RequestContext,
        req: DeviceAuthRequest,
    ) -> AuthResult<DeviceAuthResponse> {
        let uid = device_fingerprint(&req)?;

        let cached = match ctx.run(self.cache.get(&uid)).await {
            Ok(entry) => entry,
            Err(err) if is_abort(&err) => return Err(err),
            Err(err) => {
                tracing::warn!(uid = %uid, error = %err, "dedup cache lookup failed");
                None
            }
        };
        if let Some(entry) = cached {
            metrics::counter!("shellward_device_auth_total", "outcome" => "cached").increment(1);
            return self.respond(uid, entry.name, entry.namespace);
        }

        match self.authenticate_uncached(ctx, req, uid).await {
            Ok(response) => {
                metrics::counter!("shellward_device_auth_total", "outcome" => "ok").increment(1);
                Ok(response)
            }
            Err(err) => {
                metrics::counter!("shellward_device_auth_total", "outcome" => err.kind())
                    .increment(1);
                Err(err)
            }
        }
    }

    async fn authenticate_uncached(
        &self,
        ctx: &RequestContext,
        req: DeviceAuthRequest,
        uid: String,
    ) -> AuthResult<DeviceAuthResponse> {
        validate(&req)?;

        let namespace = ctx
            .run(self.store.namespace(&req.tenant_id))
            .await
            .map_err(namespace_missing(&req.tenant_id))?;

        let name = match req.hostname.as_deref() {
            Some(hostname) if !hostname.is_empty() => hostname.to_lowercase(),
            _ => req.identity.mac.replace(':', "-"),
        };
        let seen_at = Utc::now();
        let device = ctx
            .run(self.store.upsert_device(DeviceUpsert {
                uid: uid.clone(),
                name,
                identity: req.identity,
                info: req.info,
                public_key: req.public_key,
                tenant_id: req.tenant_id,
                last_seen: seen_at,
            }))
            .await?;
        ctx.run(self.store.set_device_online(&uid, true)).await?;

        for session in &req.sessions {
            if let Err(err) = ctx.run(self.store.touch_session(session, seen_at)).await {
                if is_abort(&err) {
                    return Err(err);
                }
                tracing::warn!(uid = %uid, session = %session, error = %err, "session refresh failed");
            }
        }

        let entry = CachedDevice {
            name: device.name.clone(),
            namespace: namespace.name.clone(),
        };
        if let Err(err) = ctx.run(self.cache.insert(&uid, entry)).await {
            tracing::warn!(uid = %uid, error = %err, "dedup cache populate failed");
        }

        tracing::info!(
            uid = %uid,
            tenant_id = %device.tenant_id,
            name = %device.name,
            "device authenticated"
        );
        self.respond(uid, device.name, namespace.name)
    }

    fn respond(&self, uid: String, name: String, namespace: String) -> AuthResult<DeviceAuthResponse> {
        let token = self.signer.sign(&AuthClaims::device(uid.clone(), now()))?;
        Ok(DeviceAuthResponse {
            uid,
            token,
            name,
            namespace,
        })
    }

    pub async fn get(&self, ctx: &RequestContext, tenant_id: &str, uid: &str) -> AuthResult<Device> {
        ctx.run(self.store.device(tenant_id, uid)).await
    }

    /// Move a device between pending/accepted/rejected/unused. Owner only.
    pub async fn update_status(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        uid: &str,
        status: DeviceStatus,
        owner: &UserId,
    ) -> AuthResult<Device> {
        self.guard.is_owner(ctx, tenant_id, owner).await?;
        let device = ctx
            .run(self.store.set_device_status(tenant_id, uid, status))
            .await?;
        tracing::info!(tenant_id, uid, status = ?status, "device status updated");
        Ok(device)
    }

    /// Delete a device and its sessions. Owner only.
    pub async fn remove(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        uid: &str,
        owner: &UserId,
    ) -> AuthResult<()> {
        self.guard.is_owner(ctx, tenant_id, owner).await?;
        ctx.run(self.store.delete_device(tenant_id, uid)).await?;
        if let Err(err) = ctx.run(self.cache.invalidate(uid)).await {
            tracing::warn!(uid, error = %err, "dedup cache invalidate failed");
        }
        tracing::info!(tenant_id, uid, "device removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(hostname: Option<&str>) -> DeviceAuthRequest {
        DeviceAuthRequest {
            hostname: hostname.map(str::to_string),
            identity: DeviceIdentity {
                mac: "aa:bb:cc:dd:ee:ff".to_string(),
            },
            public_key: "pk".to_string(),
            tenant_id: "t1".to_string(),
            info: DeviceInfo::default(),
            sessions: vec![],
        }
    }

    #[test]
    fn fingerprint_ignores_info_and_sessions() {
        let base = request(Some("edge-1"));
        let mut noisy = base.clone();
        noisy.info.pretty_name = "Ubuntu".to_string();
        noisy.sessions = vec!["s1".to_string()];
        assert_eq!(
            device_fingerprint(&base).expect("fp"),
            device_fingerprint(&noisy).expect("fp")
        );

        let mut moved = base.clone();
        moved.tenant_id = "t2".to_string();
        assert_ne!(
            device_fingerprint(&base).expect("fp"),
            device_fingerprint(&moved).expect("fp")
        );
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = device_fingerprint(&request(None)).expect("fp");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn validation_rules() {
        assert!(validate(&request(Some("edge-1.example.com"))).is_ok());
        assert!(validate(&request(None)).is_ok());
        assert!(validate(&request(Some("Edge-1"))).is_ok());
        assert!(validate(&request(Some("-edge"))).is_err());
        assert!(validate(&request(Some("edge_1"))).is_err());
        assert!(validate(&request(Some(&"a".repeat(64)))).is_err());

        let mut missing_mac = request(Some("edge-1"));
        missing_mac.identity.mac.clear();
        assert!(matches!(
            validate(&missing_mac),
            Err(AuthError::InvalidRequest(_))
        ));
        let mut missing_tenant = request(Some("edge-1"));
        missing_tenant.tenant_id.clear();
        assert!(validate(&missing_tenant).is_err());
        let mut missing_key = request(Some("edge-1"));
        missing_key.public_key.clear();
        assert!(validate(&missing_key).is_err());
    }
}
