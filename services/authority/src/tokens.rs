//! API token lifecycle.
//!
//! # Purpose
//! API tokens are long-lived service credentials scoped to one namespace. The
//! token id is derived from the tenant and a configured salt, so creating a
//! token twice yields the same record instead of a second credential.
//!
//! # Key invariants
//! - Tokens are created read-only.
//! - Create, update, and delete require the namespace owner.
//! - Bearer credentials for API tokens carry no expiry. Deleting the token
//!   makes validators that check the id reject its bearers, but only until the
//!   token is recreated: the id is derived from the tenant, so a recreated
//!   token revives every bearer issued before the delete. Rotating the salt is
//!   the only way to invalidate them for good.
use crate::auth::namespace::{NamespaceGuard, namespace_missing};
use crate::auth::signing::{SigningAuthority, now};
use crate::context::RequestContext;
use crate::error::{AuthError, AuthResult};
use crate::model::{ApiToken, AuthClaims, UserId};
use crate::store::CredentialStore;
use sha2::{Digest, Sha256};
use std::sync::Arc;

const TOKEN_ID_BYTES: usize = 16;

/// Hex of the first 16 bytes of SHA-256(salt || 0x00 || tenant).
pub fn derive_token_id(salt: &str, tenant_id: &str) -> String {
    let digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update([0u8])
        .chain_update(tenant_id.as_bytes())
        .finalize();
    hex::encode(&digest[..TOKEN_ID_BYTES])
}

#[derive(Clone)]
pub struct ApiTokenManager {
    store: Arc<dyn CredentialStore>,
    guard: NamespaceGuard,
    signer: SigningAuthority,
    salt: String,
}

impl ApiTokenManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        signer: SigningAuthority,
        salt: impl Into<String>,
    ) -> Self {
        Self {
            guard: NamespaceGuard::new(store.clone()),
            store,
            signer,
            salt: salt.into(),
        }
    }

    /// Create the tenant's token, or return it if it already exists.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        owner: &UserId,
    ) -> AuthResult<ApiToken> {
        self.guard.is_owner(ctx, tenant_id, owner).await?;
        let token = ApiToken {
            id: derive_token_id(&self.salt, tenant_id),
            tenant_id: tenant_id.to_string(),
            read_only: true,
        };
        let id = token.id.clone();
        match ctx.run(self.store.insert_api_token_if_absent(token)).await {
            Ok(created) => {
                tracing::info!(tenant_id, token_id = %created.id, "api token created");
                Ok(created)
            }
            Err(AuthError::Conflict(_)) => ctx.run(self.store.api_token(tenant_id, &id)).await,
            Err(err) => Err(err),
        }
    }

    pub async fn list(&self, ctx: &RequestContext, tenant_id: &str) -> AuthResult<Vec<ApiToken>> {
        ctx.run(self.store.list_api_tokens(tenant_id))
            .await
            .map_err(namespace_missing(tenant_id))
    }

    pub async fn get(&self, ctx: &RequestContext, tenant_id: &str, id: &str) -> AuthResult<ApiToken> {
        ctx.run(self.store.api_token(tenant_id, id)).await
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        id: &str,
        read_only: bool,
        owner: &UserId,
    ) -> AuthResult<ApiToken> {
        self.guard.is_owner(ctx, tenant_id, owner).await?;
        let token = ctx
            .run(self.store.set_api_token_read_only(tenant_id, id, read_only))
            .await?;
        tracing::info!(tenant_id, token_id = id, read_only, "api token updated");
        Ok(token)
    }

    pub async fn delete(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        id: &str,
        owner: &UserId,
    ) -> AuthResult<()> {
        self.guard.is_owner(ctx, tenant_id, owner).await?;
        ctx.run(self.store.delete_api_token(tenant_id, id)).await?;
        tracing::info!(tenant_id, token_id = id, "api token deleted");
        Ok(())
    }

    /// Signed bearer credential for an existing token.
    pub async fn issue_bearer(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        id: &str,
    ) -> AuthResult<String> {
        let token = self.get(ctx, tenant_id, id).await?;
        self.signer.sign(&AuthClaims::api_token(
            token.id,
            token.tenant_id,
            token.read_only,
            now(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_id_is_deterministic_per_salt_and_tenant() {
        let id = derive_token_id("salt", "t1");
        assert_eq!(id.len(), TOKEN_ID_BYTES * 2);
        assert_eq!(id, derive_token_id("salt", "t1"));
        assert_ne!(id, derive_token_id("salt", "t2"));
        assert_ne!(id, derive_token_id("pepper", "t1"));
    }

    #[test]
    fn separator_prevents_boundary_collisions() {
        assert_ne!(derive_token_id("ab", "c"), derive_token_id("a", "bc"));
    }
}
