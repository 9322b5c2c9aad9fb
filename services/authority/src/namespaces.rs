//! Namespace directory: cached lookup and owner-guarded mutation.
//!
//! # Purpose
//! Resolves namespaces for callers that need the full record (display name,
//! settings, accepted-device count) and applies membership and settings
//! changes on behalf of the namespace owner.
//!
//! # Notes
//! - Records are cached per tenant for a short TTL; the accepted-device count
//!   is always read fresh from the store.
//! - Mutations invalidate the local cache entry.
use crate::auth::namespace::{NamespaceGuard, namespace_missing, not_member};
use crate::context::RequestContext;
use crate::error::{AuthError, AuthResult};
use crate::model::{Namespace, UserId};
use crate::store::CredentialStore;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

pub const NAMESPACE_CACHE_TTL: Duration = Duration::from_secs(30);
const NAMESPACE_CACHE_CAPACITY: u64 = 10_000;

/// Outcome of consulting the namespace cache.
enum CachedLookup {
    Found(Namespace),
    MustLoad,
}

#[derive(Clone)]
pub struct NamespaceDirectory {
    store: Arc<dyn CredentialStore>,
    guard: NamespaceGuard,
    cache: Cache<String, Namespace>,
}

impl NamespaceDirectory {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self::with_cache_ttl(store, NAMESPACE_CACHE_TTL)
    }

    pub fn with_cache_ttl(store: Arc<dyn CredentialStore>, ttl: Duration) -> Self {
        Self {
            guard: NamespaceGuard::new(store.clone()),
            store,
            cache: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(NAMESPACE_CACHE_CAPACITY)
                .build(),
        }
    }

    /// Create a namespace owned by an existing user.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        name: &str,
        owner: &UserId,
    ) -> AuthResult<Namespace> {
        if tenant_id.trim().is_empty() || name.trim().is_empty() {
            return Err(AuthError::InvalidRequest(
                "tenant_id and name are required".into(),
            ));
        }
        ctx.run(self.store.user_by_id(owner)).await?;
        let namespace = ctx
            .run(self.store.insert_namespace(Namespace::new(tenant_id, name, owner.clone())))
            .await?;
        tracing::info!(tenant_id, owner = %owner, "namespace created");
        Ok(namespace)
    }

    pub async fn lookup(&self, ctx: &RequestContext, tenant_id: &str) -> AuthResult<Namespace> {
        let mut namespace = match self.cached(tenant_id).await {
            CachedLookup::Found(namespace) => namespace,
            CachedLookup::MustLoad => {
                let namespace = ctx
                    .run(self.store.namespace(tenant_id))
                    .await
                    .map_err(namespace_missing(tenant_id))?;
                self.cache
                    .insert(tenant_id.to_string(), namespace.clone())
                    .await;
                namespace
            }
        };
        namespace.devices_count = ctx.run(self.store.count_accepted_devices(tenant_id)).await?;
        Ok(namespace)
    }

    async fn cached(&self, tenant_id: &str) -> CachedLookup {
        match self.cache.get(tenant_id).await {
            Some(namespace) => CachedLookup::Found(namespace),
            None => CachedLookup::MustLoad,
        }
    }

    pub async fn add_member(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        member: &UserId,
        owner: &UserId,
    ) -> AuthResult<Namespace> {
        self.guard.is_owner(ctx, tenant_id, owner).await?;
        ctx.run(self.store.user_by_id(member)).await?;
        let namespace = ctx.run(self.store.add_member(tenant_id, member)).await?;
        self.cache.invalidate(tenant_id).await;
        tracing::info!(tenant_id, member = %member, "namespace member added");
        Ok(namespace)
    }

    pub async fn remove_member(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        member: &UserId,
        owner: &UserId,
    ) -> AuthResult<Namespace> {
        self.guard.is_owner(ctx, tenant_id, owner).await?;
        if member == owner {
            return Err(AuthError::InvalidRequest(
                "the namespace owner cannot be removed".into(),
            ));
        }
        let namespace = match ctx.run(self.store.remove_member(tenant_id, member)).await {
            Err(AuthError::NotFound(_)) => return Err(not_member(tenant_id, member)),
            other => other?,
        };
        self.cache.invalidate(tenant_id).await;
        tracing::info!(tenant_id, member = %member, "namespace member removed");
        Ok(namespace)
    }

    pub async fn set_session_record(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        enabled: bool,
        owner: &UserId,
    ) -> AuthResult<()> {
        self.guard.is_owner(ctx, tenant_id, owner).await?;
        ctx.run(self.store.set_session_record(tenant_id, enabled))
            .await?;
        self.cache.invalidate(tenant_id).await;
        Ok(())
    }

    pub async fn session_record(&self, ctx: &RequestContext, tenant_id: &str) -> AuthResult<bool> {
        Ok(self.lookup(ctx, tenant_id).await?.settings.session_record)
    }
}
