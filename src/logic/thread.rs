//! Thread coordinator.

use super::{Coordinator, upsert_sorted};
use crate::error::{ClientError, ClientResult};
use crate::repository::RepositoryFacade;
use chatsync_proto::{Message, MessageId};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Observable state of one thread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadSnapshot {
    pub parent: Option<Message>,
    /// Replies, oldest first.
    pub replies: Vec<Message>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Owns the in-memory view of the replies to one parent message.
pub struct ThreadLogic {
    parent_id: MessageId,
    repos: Arc<RepositoryFacade>,
    state: watch::Sender<ThreadSnapshot>,
    cancel: CancellationToken,
}

impl ThreadLogic {
    pub fn new(parent_id: MessageId, repos: Arc<RepositoryFacade>) -> Arc<Self> {
        let (state, _) = watch::channel(ThreadSnapshot::default());
        Arc::new(Self {
            parent_id,
            repos,
            state,
            cancel: CancellationToken::new(),
        })
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn state(&self) -> ThreadSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ThreadSnapshot> {
        self.state.subscribe()
    }

    /// Load the parent message and resident replies.
    pub async fn load(&self) -> ClientResult<()> {
        if self.is_torn_down() {
            return Err(ClientError::TornDown(format!("thread {}", self.parent_id)));
        }
        self.state.send_modify(|s| s.loading = true);

        let parent = match self.repos.messages.get(&self.parent_id).await {
            Ok(parent) => parent,
            Err(e) => {
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(e.to_string());
                });
                return Err(e.into());
            }
        };
        let replies = self.repos.messages.select_thread_replies(&self.parent_id);

        self.state.send_modify(|s| {
            s.parent = parent;
            for reply in replies.into_iter().filter(|m| !m.is_deleted()) {
                upsert_sorted(&mut s.replies, reply);
            }
            s.loading = false;
            s.error = None;
        });
        debug!(parent_id = %self.parent_id, replies = self.state.borrow().replies.len(), "Thread loaded");
        Ok(())
    }

    /// Add or replace a reply. Messages that do not reply to this thread's
    /// parent are ignored. Returns `true` if the reply was new.
    pub fn upsert_reply(&self, message: Message) -> bool {
        if message.parent_id.as_deref() != Some(self.parent_id.as_str()) || self.is_torn_down() {
            return false;
        }
        let mut inserted = false;
        self.state.send_modify(|s| inserted = upsert_sorted(&mut s.replies, message));
        inserted
    }

    /// Replace the parent message, e.g. after an edit.
    pub fn update_parent(&self, message: Message) -> bool {
        if message.id != self.parent_id || self.is_torn_down() {
            return false;
        }
        self.state.send_modify(|s| s.parent = Some(message));
        true
    }

    pub fn delete_reply(&self, message_id: &str) -> bool {
        self.state.send_if_modified(|s| {
            let before = s.replies.len();
            s.replies.retain(|m| m.id != message_id);
            s.replies.len() != before
        })
    }

    /// Whether `message_id` is the parent or one of the shown replies.
    pub fn has_message(&self, message_id: &str) -> bool {
        message_id == self.parent_id
            || self
                .state
                .borrow()
                .replies
                .iter()
                .any(|m| m.id == message_id)
    }
}

impl Coordinator for ThreadLogic {
    fn teardown(&self) {
        if !self.cancel.is_cancelled() {
            self.cancel.cancel();
            debug!(parent_id = %self.parent_id, "Thread coordinator torn down");
        }
    }

    fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepositoryConfig;
    use chatsync_proto::ChannelKey;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_load_and_upsert_replies() {
        let repos = Arc::new(RepositoryFacade::in_memory(&RepositoryConfig::default()));
        let cid = ChannelKey::new("messaging", "general");
        let t0 = Utc::now();
        repos.messages.put_many(vec![
            Message::new("root", cid.clone(), "a", "question", t0),
            Message::new("r1", cid.clone(), "b", "answer", t0 + Duration::seconds(1)).in_thread("root"),
        ]);

        let thread = ThreadLogic::new("root".into(), repos);
        thread.load().await.unwrap();
        let state = thread.state();
        assert_eq!(state.parent.unwrap().text, "question");
        assert_eq!(state.replies.len(), 1);

        let reply = Message::new("r2", cid.clone(), "a", "thanks", t0 + Duration::seconds(2))
            .in_thread("root");
        assert!(thread.upsert_reply(reply));
        assert!(!thread.upsert_reply(Message::new("top", cid, "a", "not a reply", t0)));
        assert!(thread.has_message("r2"));
        assert!(thread.has_message("root"));

        assert!(thread.delete_reply("r1"));
        assert!(!thread.has_message("r1"));
    }

    #[tokio::test]
    async fn test_load_after_teardown_fails() {
        let repos = Arc::new(RepositoryFacade::in_memory(&RepositoryConfig::default()));
        let thread = ThreadLogic::new("root".into(), repos);
        thread.teardown();
        assert!(matches!(thread.load().await, Err(ClientError::TornDown(_))));
    }
}
