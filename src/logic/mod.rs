//! Per-entity coordinators.
//!
//! A coordinator owns the observable in-memory state of one logical entity
//! (a channel, a thread, a channel-list query) and any background work tied
//! to it. Coordinators are created by the
//! [`LogicRegistry`](crate::registry::LogicRegistry) on first access and live
//! until they are removed from it; removal calls [`Coordinator::teardown`].

mod channel;
mod global;
mod query;
mod thread;

pub use channel::{ChannelLogic, ChannelSnapshot};
pub use global::GlobalState;
pub use query::{QueryChannelsLogic, QueryKey};
pub use thread::{ThreadLogic, ThreadSnapshot};

use chatsync_proto::Message;

/// A registry-managed coordinator.
pub trait Coordinator: Send + Sync + 'static {
    /// Cancel background work and detach from shared aggregates.
    ///
    /// Must be idempotent: `LogicRegistry::clear` may race with `remove`.
    fn teardown(&self);

    fn is_torn_down(&self) -> bool;
}

/// Insert `message` into `list` keeping `(created_at, id)` order.
///
/// Replaces an existing entry with the same id. Returns `true` if the id was new.
pub(crate) fn upsert_sorted(list: &mut Vec<Message>, message: Message) -> bool {
    if let Some(pos) = list.iter().position(|m| m.id == message.id) {
        list.remove(pos);
        insert_sorted(list, message);
        return false;
    }
    insert_sorted(list, message);
    true
}

fn insert_sorted(list: &mut Vec<Message>, message: Message) {
    let pos = list.partition_point(|m| {
        (m.created_at, m.id.as_str()) <= (message.created_at, message.id.as_str())
    });
    list.insert(pos, message);
}
