//! Interactive user authentication.
//!
//! # Purpose
//! Verifies a login/password pair against the stored digest and issues a
//! user token scoped to the user's first namespace. Also re-issues tokens for
//! a known user (after signup, or when switching namespaces) and resolves
//! profile data for an already-issued token.
//!
//! # Key invariants
//! - Logins are matched lowercase, by username first and by email only when
//!   no username matches.
//! - Password digests are compared in constant time.
//! - User tokens always expire; the `role` claim is always derived from
//!   membership, and `admin` follows the configured `AdminClaimPolicy`.
use crate::auth::namespace::{namespace_missing, not_member};
use crate::auth::signing::{SigningAuthority, now};
use crate::context::RequestContext;
use crate::error::{AuthError, AuthResult};
use crate::model::{AuthClaims, MemberRole, Namespace, SubjectType, User, UserId};
use crate::store::CredentialStore;
use serde::{Deserialize, Serialize};
use shellward_crypto::{digest_matches, password_digest};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_USER_TOKEN_TTL: Duration = Duration::from_secs(72 * 60 * 60);

/// How the `admin` claim of a user token is decided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdminClaimPolicy {
    /// Every user token carries `admin: true`. Consumers that need real
    /// authorization must look at `role`.
    #[default]
    Unconditional,
    /// `admin` is true only for the owner of the token's namespace.
    OwnerOnly,
}

impl AdminClaimPolicy {
    pub fn admin_for(self, role: Option<MemberRole>) -> bool {
        match self {
            AdminClaimPolicy::Unconditional => true,
            AdminClaimPolicy::OwnerOnly => role == Some(MemberRole::Owner),
        }
    }
}

impl FromStr for AdminClaimPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unconditional" => Ok(AdminClaimPolicy::Unconditional),
            "owner-only" | "owner_only" => Ok(AdminClaimPolicy::OwnerOnly),
            other => Err(format!("unknown admin claim policy: {other}")),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct UserAuthRequest {
    /// Username or email.
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for UserAuthRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserAuthRequest")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAuthResponse {
    pub token: String,
    pub id: UserId,
    pub user: String,
    pub name: String,
    pub email: String,
    /// Empty when the user belongs to no namespace.
    pub tenant: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MemberRole>,
}

#[derive(Clone)]
pub struct UserAuthenticator {
    store: Arc<dyn CredentialStore>,
    signer: SigningAuthority,
    policy: AdminClaimPolicy,
    token_ttl: Duration,
}

impl UserAuthenticator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        signer: SigningAuthority,
        policy: AdminClaimPolicy,
        token_ttl: Duration,
    ) -> Self {
        Self {
            store,
            signer,
            policy,
            token_ttl,
        }
    }

    pub async fn authenticate(
        &self,
        ctx: &RequestContext,
        req: UserAuthRequest,
    ) -> AuthResult<UserAuthResponse> {
        let result = self.verify_credentials(ctx, &req).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.kind(),
        };
        metrics::counter!("shellward_user_auth_total", "outcome" => outcome).increment(1);
        let user = result?;

        let namespace = self.first_namespace(ctx, &user.id).await?;
        let response = self.issue(user, namespace.as_ref())?;
        tracing::info!(user = %response.id, tenant_id = %response.tenant, "user authenticated");
        Ok(response)
    }

    async fn verify_credentials(
        &self,
        ctx: &RequestContext,
        req: &UserAuthRequest,
    ) -> AuthResult<User> {
        let login = req.username.to_lowercase();
        let user = match ctx.run(self.store.user_by_username(&login)).await {
            Ok(user) => user,
            Err(AuthError::NotFound(_)) => match ctx.run(self.store.user_by_email(&login)).await {
                Ok(user) => user,
                Err(AuthError::NotFound(_)) => return Err(AuthError::Unauthorized),
                Err(err) => return Err(err),
            },
            Err(err) => return Err(err),
        };
        if !digest_matches(&password_digest(&req.password), &user.password) {
            tracing::debug!(user = %user.id, "password mismatch");
            return Err(AuthError::Unauthorized);
        }
        Ok(user)
    }

    /// Issue a token for a known user without a password check.
    pub async fn issue_token_for_user(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
    ) -> AuthResult<UserAuthResponse> {
        let user = ctx.run(self.store.user_by_id(user_id)).await?;
        let namespace = self.first_namespace(ctx, &user.id).await?;
        self.issue(user, namespace.as_ref())
    }

    /// Re-issue a token scoped to `tenant_id`, which the user must belong to.
    pub async fn switch_tenant(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
        tenant_id: &str,
    ) -> AuthResult<UserAuthResponse> {
        let namespace = ctx
            .run(self.store.namespace(tenant_id))
            .await
            .map_err(namespace_missing(tenant_id))?;
        let user = match ctx.run(self.store.user_by_id(user_id)).await {
            Err(AuthError::NotFound(_)) => return Err(AuthError::Unauthorized),
            other => other?,
        };
        if !namespace.members.contains(&user.id) {
            return Err(not_member(tenant_id, &user.id));
        }
        tracing::info!(user = %user.id, tenant_id, "user switched namespace");
        self.issue(user, Some(&namespace))
    }

    /// Profile data for a token the caller already holds. `tenant_id` may be
    /// empty for users without a namespace.
    pub async fn user_info(
        &self,
        ctx: &RequestContext,
        username: &str,
        tenant_id: &str,
        token: &str,
    ) -> AuthResult<UserAuthResponse> {
        let user = match ctx.run(self.store.user_by_username(username)).await {
            Err(AuthError::NotFound(_)) => return Err(AuthError::Unauthorized),
            other => other?,
        };
        let role = if tenant_id.is_empty() {
            None
        } else {
            let namespace = match ctx.run(self.store.namespace(tenant_id)).await {
                Err(AuthError::NotFound(_)) => return Err(AuthError::Unauthorized),
                other => other?,
            };
            namespace.role_of(&user.id)
        };
        Ok(UserAuthResponse {
            token: token.to_string(),
            id: user.id,
            user: user.username,
            name: user.name,
            email: user.email,
            tenant: tenant_id.to_string(),
            role,
        })
    }

    async fn first_namespace(
        &self,
        ctx: &RequestContext,
        user: &UserId,
    ) -> AuthResult<Option<Namespace>> {
        match ctx.run(self.store.first_namespace_of_member(user)).await {
            Ok(namespace) => Ok(Some(namespace)),
            Err(AuthError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn issue(&self, user: User, namespace: Option<&Namespace>) -> AuthResult<UserAuthResponse> {
        let role = namespace.and_then(|namespace| namespace.role_of(&user.id));
        let tenant = namespace
            .map(|namespace| namespace.tenant_id.clone())
            .unwrap_or_default();
        let issued_at = now();
        let ttl = i64::try_from(self.token_ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = AuthClaims {
            subject_type: SubjectType::User,
            sub: user.id.to_string(),
            tenant: Some(tenant.clone()),
            username: Some(user.username.clone()),
            admin: Some(self.policy.admin_for(role)),
            role,
            read_only: None,
            iat: issued_at,
            exp: Some(issued_at.saturating_add(ttl)),
        };
        let token = self.signer.sign(&claims)?;
        Ok(UserAuthResponse {
            token,
            id: user.id,
            user: user.username,
            name: user.name,
            email: user.email,
            tenant,
            role,
        })
    }
}
