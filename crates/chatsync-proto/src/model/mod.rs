//! Synchronized domain entities and the keys that address them.
//!
//! Every entity implements [`Entity`], which is what the repository layer is
//! generic over. Keys use value equality: two `ChannelKey`s built from the
//! same type and id are the same channel everywhere in the core.

mod channel;
mod message;
mod query;
mod user;

pub use channel::{Channel, ChannelKey};
pub use message::Message;
pub use query::{QueryFilter, QuerySort, SortDirection, SortField, SortSpec};
pub use user::User;

use std::fmt::Debug;
use std::hash::Hash;

/// Identifier of a user.
pub type UserId = String;

/// Identifier of a message.
pub type MessageId = String;

/// Identifier handed out by the backend for one live socket connection.
pub type ConnectionId = String;

/// An entity that can be cached and persisted by key.
pub trait Entity: Clone + PartialEq + Debug + Send + Sync + 'static {
    /// Key type; equal keys address the same entity.
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Key of this entity.
    fn key(&self) -> Self::Key;
}
