//! Authentication and tenant authorization.
//!
//! # Purpose
//! Groups the signing authority, device and user authentication, and the
//! namespace ownership/membership guard.
pub mod device;
pub mod namespace;
pub mod signing;
pub mod user;

pub use device::{DeviceAuthRequest, DeviceAuthResponse, DeviceResolver};
pub use namespace::NamespaceGuard;
pub use signing::{SigningAuthority, SigningKeyPaths};
pub use user::{AdminClaimPolicy, UserAuthRequest, UserAuthResponse, UserAuthenticator};
