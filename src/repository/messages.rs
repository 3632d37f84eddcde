//! Message repository.
//!
//! The durable store only supports key lookups, so the channel and thread
//! queries here scan what is resident in memory. Coordinators load full
//! histories through the transport, not through this repository.

use super::Repository;
use chatsync_proto::{ChannelKey, Message};

pub type MessageRepository = Repository<Message>;

impl Repository<Message> {
    /// Resident replies to `parent_id`, oldest first.
    pub fn select_thread_replies(&self, parent_id: &str) -> Vec<Message> {
        let mut replies: Vec<Message> = self
            .resident()
            .into_iter()
            .filter(|m| m.parent_id.as_deref() == Some(parent_id))
            .collect();
        replies.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        replies
    }

    /// The newest `limit` resident top-level messages of `cid`, oldest first.
    pub fn select_channel_messages(&self, cid: &ChannelKey, limit: usize) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .resident()
            .into_iter()
            .filter(|m| m.cid == *cid && !m.is_reply())
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let skip = messages.len().saturating_sub(limit);
        messages.split_off(skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_thread_and_channel_selection() {
        let repo: Arc<MessageRepository> =
            Repository::new("messages", Arc::new(MemoryStore::<Message>::new()), 32, Duration::from_secs(1));
        let cid = ChannelKey::new("messaging", "general");
        let t0 = Utc::now();
        let at = |s: i64| t0 + ChronoDuration::seconds(s);

        repo.put_many(vec![
            Message::new("root", cid.clone(), "a", "root", at(0)),
            Message::new("r2", cid.clone(), "b", "second", at(2)).in_thread("root"),
            Message::new("r1", cid.clone(), "b", "first", at(1)).in_thread("root"),
            Message::new("m3", cid.clone(), "a", "later", at(3)),
            Message::new("x", ChannelKey::new("messaging", "other"), "a", "elsewhere", at(4)),
        ]);

        let replies: Vec<_> = repo
            .select_thread_replies("root")
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(replies, vec!["r1", "r2"]);

        let latest: Vec<_> = repo
            .select_channel_messages(&cid, 1)
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(latest, vec!["m3"]);
        assert_eq!(repo.select_channel_messages(&cid, 10).len(), 2);
    }
}
