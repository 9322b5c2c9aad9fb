//! Namespace ownership and membership checks.
//!
//! # Purpose
//! Every mutating operation on a namespace's resources is gated on the caller
//! owning that namespace; reads are gated on membership. The guard is
//! read-only and cheap to clone, so each service keeps its own handle.
use crate::context::RequestContext;
use crate::error::{AuthError, AuthResult};
use crate::model::{MemberRole, Namespace, UserId};
use crate::store::CredentialStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct NamespaceGuard {
    store: Arc<dyn CredentialStore>,
}

impl NamespaceGuard {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// `Unauthorized` for an unknown user or a user who is not the owner;
    /// `NamespaceNotFound` for an unknown tenant.
    pub async fn is_owner(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        user: &UserId,
    ) -> AuthResult<()> {
        match ctx.run(self.store.user_by_id(user)).await {
            Ok(_) => {}
            Err(AuthError::NotFound(_)) => return Err(AuthError::Unauthorized),
            Err(err) => return Err(err),
        }
        let namespace = self.namespace(ctx, tenant_id).await?;
        if namespace.owner != *user {
            tracing::debug!(tenant_id, user = %user, "caller is not the namespace owner");
            return Err(AuthError::Unauthorized);
        }
        Ok(())
    }

    pub async fn is_member(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        user: &UserId,
    ) -> AuthResult<()> {
        self.role_of(ctx, tenant_id, user).await.map(|_| ())
    }

    pub async fn role_of(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        user: &UserId,
    ) -> AuthResult<MemberRole> {
        let namespace = self.namespace(ctx, tenant_id).await?;
        namespace.role_of(user).ok_or_else(|| not_member(tenant_id, user))
    }

    async fn namespace(&self, ctx: &RequestContext, tenant_id: &str) -> AuthResult<Namespace> {
        ctx.run(self.store.namespace(tenant_id))
            .await
            .map_err(namespace_missing(tenant_id))
    }
}

/// Rewrites a store `NotFound` into `NamespaceNotFound` for `tenant_id`.
pub(crate) fn namespace_missing(tenant_id: &str) -> impl FnOnce(AuthError) -> AuthError + '_ {
    move |err| match err {
        AuthError::NotFound(_) => AuthError::NamespaceNotFound(tenant_id.to_string()),
        other => other,
    }
}

pub(crate) fn not_member(tenant_id: &str, user: &UserId) -> AuthError {
    AuthError::NotMember {
        tenant_id: tenant_id.to_string(),
        user: user.to_string(),
    }
}
