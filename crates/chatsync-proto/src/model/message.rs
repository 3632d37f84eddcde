//! Message entity.

use super::{ChannelKey, Entity, MessageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message in a channel, optionally a reply inside a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub cid: ChannelKey,
    pub user_id: UserId,
    #[serde(default)]
    pub text: String,
    /// Root message id when this message is a thread reply.
    #[serde(default)]
    pub parent_id: Option<MessageId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(
        id: impl Into<MessageId>,
        cid: ChannelKey,
        user_id: impl Into<UserId>,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            cid,
            user_id: user_id.into(),
            text: text.into(),
            parent_id: None,
            created_at,
            updated_at: None,
            deleted_at: None,
        }
    }

    /// Mark this message as a reply to `parent_id`.
    pub fn in_thread(mut self, parent_id: impl Into<MessageId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl Entity for Message {
    type Key = MessageId;

    fn key(&self) -> MessageId {
        self.id.clone()
    }
}
