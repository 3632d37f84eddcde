//! Channel coordinator.

use super::{Coordinator, GlobalState, upsert_sorted};
use crate::error::{ClientError, ClientResult, FlushError};
use crate::repository::RepositoryFacade;
use chatsync_proto::{Channel, ChannelKey, Message};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Observable state of one channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelSnapshot {
    pub channel: Option<Channel>,
    /// Top-level messages, oldest first. Thread replies live in thread coordinators.
    pub messages: Vec<Message>,
    pub unread_count: u32,
    pub loading: bool,
    /// Set when the connection dropped while this channel was watched.
    pub needs_sync: bool,
    /// Last load or background flush failure.
    pub error: Option<String>,
}

/// Owns the in-memory view of one channel.
pub struct ChannelLogic {
    cid: ChannelKey,
    repos: Arc<RepositoryFacade>,
    global: Arc<GlobalState>,
    message_limit: usize,
    state: watch::Sender<ChannelSnapshot>,
    cancel: CancellationToken,
    listening: AtomicBool,
}

impl ChannelLogic {
    pub fn new(
        cid: ChannelKey,
        repos: Arc<RepositoryFacade>,
        global: Arc<GlobalState>,
        message_limit: usize,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(ChannelSnapshot::default());
        Arc::new(Self {
            cid,
            repos,
            global,
            message_limit: message_limit.max(1),
            state,
            cancel: CancellationToken::new(),
            listening: AtomicBool::new(false),
        })
    }

    pub fn cid(&self) -> &ChannelKey {
        &self.cid
    }

    pub fn state(&self) -> ChannelSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChannelSnapshot> {
        self.state.subscribe()
    }

    /// Start watching: load from the repositories and surface flush failures.
    pub async fn watch(self: &Arc<Self>) -> ClientResult<()> {
        self.ensure_active()?;
        if !self.listening.swap(true, Ordering::AcqRel) {
            self.spawn_error_listener();
        }
        self.load().await
    }

    /// Reload after the connection came back.
    pub async fn reconcile(&self) -> ClientResult<()> {
        self.ensure_active()?;
        self.load().await
    }

    async fn load(&self) -> ClientResult<()> {
        self.state.send_modify(|s| s.loading = true);

        let channel = match self.repos.channels.get(&self.cid).await {
            Ok(channel) => channel.filter(|c| !c.is_deleted()),
            Err(e) => {
                warn!(cid = %self.cid, error = %e, "Channel load failed");
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(e.to_string());
                });
                return Err(e.into());
            }
        };
        let resident = self
            .repos
            .messages
            .select_channel_messages(&self.cid, self.message_limit);

        let limit = self.message_limit;
        self.state.send_modify(|s| {
            if channel.is_some() {
                s.channel = channel;
            }
            for message in resident.into_iter().filter(|m| !m.is_deleted()) {
                upsert_sorted(&mut s.messages, message);
            }
            truncate_front(&mut s.messages, limit);
            s.loading = false;
            s.needs_sync = false;
            s.error = None;
        });
        debug!(cid = %self.cid, messages = self.state.borrow().messages.len(), "Channel loaded");
        Ok(())
    }

    /// Add or replace a top-level message of this channel.
    ///
    /// Returns `true` if the message was not shown before. New messages from
    /// anyone but the local user count as unread.
    pub fn upsert_message(&self, message: Message) -> bool {
        if message.cid != self.cid || message.is_reply() || self.is_torn_down() {
            return false;
        }
        let own = self
            .repos
            .users
            .current_user_id()
            .is_some_and(|id| id == message.user_id);

        let limit = self.message_limit;
        let mut inserted = false;
        self.state.send_modify(|s| {
            inserted = upsert_sorted(&mut s.messages, message);
            truncate_front(&mut s.messages, limit);
            // Reported under the snapshot lock so the aggregate follows the
            // same order as the snapshot and never outlives teardown.
            if inserted && !own && !self.is_torn_down() {
                s.unread_count += 1;
                self.global.set_unread(&self.cid, s.unread_count);
            }
        });
        inserted
    }

    /// Remove a message from the view. Returns `true` if it was shown.
    pub fn delete_message(&self, message_id: &str) -> bool {
        self.state.send_if_modified(|s| {
            let before = s.messages.len();
            s.messages.retain(|m| m.id != message_id);
            s.messages.len() != before
        })
    }

    pub fn has_message(&self, message_id: &str) -> bool {
        self.state
            .borrow()
            .messages
            .iter()
            .any(|m| m.id == message_id)
    }

    /// Replace the channel data. Ignored for other channels and tombstones.
    pub fn update_channel(&self, channel: Channel) -> bool {
        if channel.key != self.cid || channel.is_deleted() {
            return false;
        }
        self.state.send_if_modified(|s| {
            if s.channel.as_ref() == Some(&channel) {
                return false;
            }
            s.channel = Some(channel);
            true
        })
    }

    pub fn mark_read(&self) {
        self.state.send_if_modified(|s| {
            if s.unread_count == 0 {
                return false;
            }
            s.unread_count = 0;
            self.global.set_unread(&self.cid, 0);
            true
        });
    }

    pub fn unread_count(&self) -> u32 {
        self.state.borrow().unread_count
    }

    pub fn mark_needs_sync(&self) {
        self.state.send_if_modified(|s| !std::mem::replace(&mut s.needs_sync, true));
    }

    pub fn needs_sync(&self) -> bool {
        self.state.borrow().needs_sync
    }

    fn report_flush_error(&self, err: &FlushError) {
        warn!(cid = %self.cid, repository = err.repository, lost = err.lost, "Surfacing flush failure");
        self.state.send_modify(|s| s.error = Some(err.to_string()));
    }

    fn ensure_active(&self) -> ClientResult<()> {
        if self.is_torn_down() {
            return Err(ClientError::TornDown(self.cid.to_string()));
        }
        Ok(())
    }

    fn spawn_error_listener(self: &Arc<Self>) {
        let Ok(handle) = Handle::try_current() else {
            warn!(cid = %self.cid, "No runtime, flush errors will not be surfaced");
            return;
        };
        let this: Weak<Self> = Arc::downgrade(self);
        let cancel = self.cancel.clone();
        let mut channel_errors = self.repos.channels.subscribe_errors();
        let mut message_errors = self.repos.messages.subscribe_errors();

        handle.spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = cancel.cancelled() => break,
                    r = channel_errors.recv() => r,
                    r = message_errors.recv() => r,
                };
                match received {
                    Ok(err) => {
                        let Some(this) = this.upgrade() else { break };
                        this.report_flush_error(&err);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Flush error listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}

impl Coordinator for ChannelLogic {
    fn teardown(&self) {
        let mut first = false;
        self.state.send_if_modified(|_| {
            if !self.cancel.is_cancelled() {
                self.cancel.cancel();
                self.global.forget(&self.cid);
                first = true;
            }
            false
        });
        if first {
            debug!(cid = %self.cid, "Channel coordinator torn down");
        }
    }

    fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

fn truncate_front(messages: &mut Vec<Message>, limit: usize) {
    let excess = messages.len().saturating_sub(limit);
    if excess > 0 {
        messages.drain(..excess);
    }
}
