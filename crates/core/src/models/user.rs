//! Cached identity snapshot

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role string that grants access to the admin console
pub const ADMIN_ROLE: &str = "admin";

/// Cached snapshot of the authenticated identity.
///
/// The catalog server owns the record shape, so every attribute is optional
/// and unknown attributes are carried through untouched. This is a
/// read-through cache, not the authoritative record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Attributes the console does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl UserRecord {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }

    /// Best-effort display name for logs and the shell
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("(unknown)")
    }
}
