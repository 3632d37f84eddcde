//! chatsync - client-side connection and state sync core.
//!
//! Keeps a local, possibly stale view of users, channels and messages
//! consistent with a chat backend while the connection comes up, drops and
//! recovers:
//!
//! - [`state`]: serialized socket and identity machines plus the derived client status
//! - [`repository`]: LRU-cached, batch-flushed repositories over a [`store::DurableStore`]
//! - [`registry`]: one coordinator per channel, thread or channel-list query
//! - [`sync`]: the engine routing transport, identity and chat events

pub mod config;
pub mod error;
pub mod logic;
pub mod registry;
pub mod repository;
pub mod state;
pub mod store;
pub mod sync;
pub mod telemetry;

pub use chatsync_proto as proto;
pub use error::{ClientError, ClientResult};
pub use sync::{ChatEvent, SyncEngine};
