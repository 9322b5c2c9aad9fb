#![allow(dead_code)]

use authority::RequestContext;
use authority::auth::SigningAuthority;
use authority::model::{Namespace, User, UserId};
use authority::store::CredentialStore;
use authority::store::memory::InMemoryStore;
use std::sync::Arc;

pub const PRIVATE_PEM: &[u8] = include_bytes!("../fixtures/signing.pem");
pub const PUBLIC_PEM: &[u8] = include_bytes!("../fixtures/signing.pub.pem");
pub const OTHER_PUBLIC_PEM: &[u8] = include_bytes!("../fixtures/other.pub.pem");

pub const EDGE_KEY: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIHzGDUcD2S2grimHo8jH3zpqK+0Qk8P/1fNfZFY09nci edge";
pub const EDGE_FINGERPRINT: &str = "2b:80:d4:c1:71:75:8f:dc:57:1c:61:93:d0:cb:83:cc";
pub const OPS_KEY: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIKpYvr0Nvrw02TL5+GamUwiEv1OYK4rHWyEiaggIEmpz ops";
pub const OPS_FINGERPRINT: &str = "f1:2b:82:ba:57:5c:1e:0f:54:b5:8e:3d:e5:91:c5:58";

pub fn signer() -> SigningAuthority {
    SigningAuthority::from_pem(PRIVATE_PEM, PUBLIC_PEM).expect("signing authority")
}

pub fn ctx() -> RequestContext {
    RequestContext::new()
}

pub fn store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::new())
}

pub async fn seed_user(store: &InMemoryStore, id: &str, password: &str) -> User {
    store
        .insert_user(User {
            id: UserId::new(id),
            username: id.to_string(),
            email: format!("{id}@example.com"),
            name: format!("User {id}"),
            password: shellward_crypto::password_digest(password),
        })
        .await
        .expect("seed user")
}

/// Namespace `tenant_id` owned by `owner`, with `members` added.
pub async fn seed_namespace(
    store: &InMemoryStore,
    tenant_id: &str,
    name: &str,
    owner: &str,
    members: &[&str],
) -> Namespace {
    store
        .insert_namespace(Namespace::new(tenant_id, name, UserId::new(owner)))
        .await
        .expect("seed namespace");
    let mut namespace = store.namespace(tenant_id).await.expect("namespace");
    for member in members {
        namespace = store
            .add_member(tenant_id, &UserId::new(*member))
            .await
            .expect("seed member");
    }
    namespace
}
