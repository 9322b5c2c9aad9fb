//! Authority service wiring.
//!
//! # Purpose
//! Builds every service from configuration and a store handle, and exposes
//! the small system router (health and verification key) served by the
//! binary.
//!
//! # Notes
//! Missing or mismatched key material and unsupported cache backends fail
//! here, before anything is served.
use crate::auth::{
    DeviceResolver, NamespaceGuard, SigningAuthority, UserAuthenticator,
};
use crate::config::AuthorityConfig;
use crate::error::StartupError;
use crate::namespaces::NamespaceDirectory;
use crate::sshkeys::PublicKeyRegistry;
use crate::store::CredentialStore;
use crate::tokens::ApiTokenManager;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthorityServices {
    pub store: Arc<dyn CredentialStore>,
    pub signer: SigningAuthority,
    pub devices: DeviceResolver,
    pub users: UserAuthenticator,
    pub guard: NamespaceGuard,
    pub namespaces: NamespaceDirectory,
    pub public_keys: PublicKeyRegistry,
    pub api_tokens: ApiTokenManager,
}

impl AuthorityServices {
    /// Load the signing keypair named by `config` and build the services.
    pub fn build(
        config: &AuthorityConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, StartupError> {
        let signer = SigningAuthority::load(&config.signing_keys)?;
        Self::with_signer(config, store, signer)
    }

    pub fn with_signer(
        config: &AuthorityConfig,
        store: Arc<dyn CredentialStore>,
        signer: SigningAuthority,
    ) -> Result<Self, StartupError> {
        let dedup_cache = config.dedup_cache.build()?;
        if config.token_salt.is_empty() {
            tracing::warn!("SHELLWARD_TOKEN_SALT is empty; api token ids are derived from the tenant id alone");
        }
        tracing::info!(
            backend = store.backend_name(),
            cache = %config.dedup_cache.url,
            admin_claim = ?config.admin_claim,
            "authority services built"
        );
        Ok(Self {
            devices: DeviceResolver::new(store.clone(), dedup_cache, signer.clone()),
            users: UserAuthenticator::new(
                store.clone(),
                signer.clone(),
                config.admin_claim,
                config.user_token_ttl,
            ),
            guard: NamespaceGuard::new(store.clone()),
            namespaces: NamespaceDirectory::new(store.clone()),
            public_keys: PublicKeyRegistry::with_challenge_key_bits(
                store.clone(),
                config.challenge_key_bits,
            ),
            api_tokens: ApiTokenManager::new(
                store.clone(),
                signer.clone(),
                config.token_salt.clone(),
            ),
            signer,
            store,
        })
    }
}

pub fn build_router(services: AuthorityServices) -> Router {
    Router::new()
        .route("/v1/system/health", axum::routing::get(system_health))
        .route("/v1/auth/public-key", axum::routing::get(public_key))
        .with_state(services)
}

async fn system_health(State(services): State<AuthorityServices>) -> impl IntoResponse {
    match services.store.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(err) => {
            tracing::warn!(error = %err, "store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}

async fn public_key(State(services): State<AuthorityServices>) -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "application/x-pem-file")],
        services.signer.public_key_pem().to_string(),
    )
}
