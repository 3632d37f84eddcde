//! User entity.

use super::{Entity, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A chat user as last seen by this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub invisible: bool,
    #[serde(default)]
    pub banned: bool,
    /// Free-form custom fields.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_role() -> String {
    "user".to_string()
}

impl User {
    /// Create a user with only an id and display name set.
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image: None,
            role: default_role(),
            invisible: false,
            banned: false,
            extra: BTreeMap::new(),
            updated_at: None,
        }
    }

    /// Builder-style name replacement.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Anonymous identities are minted by the backend with an `!anon` prefix.
    pub fn is_anonymous(&self) -> bool {
        self.id.starts_with("!anon")
    }
}

impl Entity for User {
    type Key = UserId;

    fn key(&self) -> UserId {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_key_is_id() {
        let user = User::new("alice", "Alice");
        assert_eq!(user.key(), "alice");
    }

    #[test]
    fn test_with_name_changes_equality() {
        let user = User::new("alice", "Alice");
        let renamed = user.clone().with_name("Alicia");
        assert_ne!(user, renamed);
        assert_eq!(user.key(), renamed.key());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let user: User = serde_json::from_str(r#"{"id":"bob"}"#).unwrap();
        assert_eq!(user.role, "user");
        assert!(user.extra.is_empty());
        assert!(!user.is_anonymous());
    }
}
