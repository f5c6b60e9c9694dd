pub mod conversation;
pub mod message;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User record as served by the external user directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub role: String,
    pub avatar: Option<String>,
}

impl UserProfile {
    /// Placeholder profile used when the directory cannot resolve a user.
    pub fn fallback(id: Uuid) -> Self {
        Self {
            id,
            name: "User".to_string(),
            email: None,
            role: "customer".to_string(),
            avatar: None,
        }
    }
}

/// Directory projection returned by contact lookups.
#[derive(Debug, Clone, Serialize)]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub role: String,
    pub avatar: Option<String>,
}

impl From<UserProfile> for Contact {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            name: profile.name,
            email: profile.email,
            role: profile.role,
            avatar: profile.avatar,
        }
    }
}

/// Character-based truncation so a preview never splits a code point.
pub(crate) fn truncate_chars(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        value.chars().take(max).collect()
    }
}
