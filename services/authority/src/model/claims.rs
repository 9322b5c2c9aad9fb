//! Claims carried by tokens issued by the signing authority.
//!
//! # Purpose
//! One claim shape covers device, user, and API-token subjects. Fields that do
//! not apply to a subject are omitted from the encoded token.
//!
//! # Key invariants
//! - `claims` names the subject type and is always present.
//! - Device and API-token claims carry no `exp`; user claims always do.
//! - `role` reflects the namespace membership the token was issued for;
//!   `admin` is derived from it according to the configured policy.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubjectType {
    Device,
    User,
    ApiToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    #[serde(rename = "claims")]
    pub subject_type: SubjectType,
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MemberRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl AuthClaims {
    /// Claims for a device token: subject is the device fingerprint.
    pub fn device(uid: impl Into<String>, issued_at: i64) -> Self {
        Self {
            subject_type: SubjectType::Device,
            sub: uid.into(),
            tenant: None,
            username: None,
            admin: None,
            role: None,
            read_only: None,
            iat: issued_at,
            exp: None,
        }
    }

    /// Claims for an API-token bearer credential.
    pub fn api_token(
        token_id: impl Into<String>,
        tenant_id: impl Into<String>,
        read_only: bool,
        issued_at: i64,
    ) -> Self {
        Self {
            subject_type: SubjectType::ApiToken,
            sub: token_id.into(),
            tenant: Some(tenant_id.into()),
            username: None,
            admin: None,
            role: None,
            read_only: Some(read_only),
            iat: issued_at,
            exp: None,
        }
    }
}
