use serde::{Deserialize, Serialize};

/// Long-lived service credential scoped to one namespace.
///
/// Stored as its own record keyed by `(tenant_id, id)` so reads and updates of
/// one token never rewrite the others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiToken {
    pub id: String,
    pub tenant_id: String,
    pub read_only: bool,
}
