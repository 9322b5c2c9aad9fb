//! Device and session records.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Unused,
}

/// Hardware identity reported by the device agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub mac: String,
}

/// Free-form platform information; not part of the device identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub pretty_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub platform: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub uid: String,
    pub name: String,
    pub identity: DeviceIdentity,
    pub info: DeviceInfo,
    pub public_key: String,
    pub tenant_id: String,
    pub status: DeviceStatus,
    pub online: bool,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Upsert payload written on every cache-missing authentication.
///
/// `name` is only used when the device is inserted; existing devices keep
/// their name and status.
#[derive(Debug, Clone)]
pub struct DeviceUpsert {
    pub uid: String,
    pub name: String,
    pub identity: DeviceIdentity,
    pub info: DeviceInfo,
    pub public_key: String,
    pub tenant_id: String,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub uid: String,
    pub device_uid: String,
    pub tenant_id: String,
    pub last_seen: DateTime<Utc>,
    pub closed: bool,
}
