//! Client connection state.
//!
//! Wraps the sans-IO machines from `chatsync_proto` in serialized cells and
//! derives the composite [`ClientStatus`](chatsync_proto::ClientStatus) from
//! them.

mod cell;
mod client;

pub use cell::{Committed, StateCell};
pub use client::ClientState;
