//! Authority data model.
//!
//! # Purpose
//! Re-exports the device, user, namespace, key, token, and claim records that
//! flow between the services and the credential store.
mod claims;
mod device;
mod key;
mod namespace;
mod token;
mod user;

pub use claims::{AuthClaims, MemberRole, SubjectType};
pub use device::{Device, DeviceIdentity, DeviceInfo, DeviceStatus, DeviceUpsert, Session};
pub use key::{NewPublicKey, PrivateKey, PublicKey, PublicKeyUpdate};
pub use namespace::{MemberSet, Namespace, NamespaceSettings};
pub use token::ApiToken;
pub use user::{User, UserId};
