//! User records and typed user identifiers.
use serde::{Deserialize, Serialize};

/// User identifier.
///
/// Serialized as a bare string; any other JSON type is rejected when
/// decoding, which is what keeps namespace member lists homogeneous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub name: String,
    /// Hex SHA-256 password digest.
    pub password: String,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_rejects_non_string_json() {
        assert!(serde_json::from_str::<UserId>("42").is_err());
        assert!(serde_json::from_str::<UserId>("{\"id\":\"u1\"}").is_err());
        let id: UserId = serde_json::from_str("\"u1\"").expect("decode");
        assert_eq!(id.as_str(), "u1");
    }

    #[test]
    fn debug_hides_password_digest() {
        let user = User {
            id: UserId::new("u1"),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            password: "deadbeef".to_string(),
        };
        assert!(!format!("{user:?}").contains("deadbeef"));
    }
}
