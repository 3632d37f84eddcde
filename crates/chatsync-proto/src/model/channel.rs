//! Channel entity and its composite key.

use super::{Entity, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite channel key: `(channel_type, channel_id)`.
///
/// Displays as the backend "cid" form `type:id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelKey {
    pub channel_type: String,
    pub channel_id: String,
}

impl ChannelKey {
    pub fn new(channel_type: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            channel_type: channel_type.into(),
            channel_id: channel_id.into(),
        }
    }

    /// Parse a `type:id` cid. Both halves must be non-empty.
    pub fn parse(cid: &str) -> Option<Self> {
        let (channel_type, channel_id) = cid.split_once(':')?;
        if channel_type.is_empty() || channel_id.is_empty() {
            return None;
        }
        Some(Self::new(channel_type, channel_id))
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel_type, self.channel_id)
    }
}

/// A channel as last seen by this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub key: ChannelKey,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub member_ids: Vec<UserId>,
    #[serde(default)]
    pub frozen: bool,
    #[serde(default)]
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    /// Set when the backend deleted the channel. Kept as a tombstone.
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Channel {
    pub fn new(key: ChannelKey, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            key,
            name: name.into(),
            member_ids: Vec::new(),
            frozen: false,
            hidden: false,
            created_at,
            last_message_at: None,
            deleted_at: None,
        }
    }

    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UserId>,
    {
        self.member_ids = members.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.member_ids.iter().any(|m| m == user_id)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Tombstone copy of this channel.
    pub fn deleted(mut self, at: DateTime<Utc>) -> Self {
        self.deleted_at = Some(at);
        self
    }
}

impl Entity for Channel {
    type Key = ChannelKey;

    fn key(&self) -> ChannelKey {
        self.key.clone()
    }
}
