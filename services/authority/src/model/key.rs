//! SSH public key registrations and server-held private keys.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    /// OpenSSH authorized-key line.
    pub data: String,
    /// Legacy MD5 fingerprint, unique within a tenant.
    pub fingerprint: String,
    pub tenant_id: String,
    pub name: String,
    /// Regular expression a device name must match; `None` allows every device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPublicKey {
    pub data: String,
    pub tenant_id: String,
    pub name: String,
    #[serde(default)]
    pub hostname: Option<String>,
}

/// Replacement values for the mutable fields of a registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyUpdate {
    pub name: String,
    #[serde(default)]
    pub hostname: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct PrivateKey {
    pub fingerprint: String,
    /// PKCS#1 PEM.
    pub data: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("fingerprint", &self.fingerprint)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
