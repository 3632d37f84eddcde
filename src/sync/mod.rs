//! Sync engine.
//!
//! Routes transport, identity and chat events through the connection
//! machines, the repositories and the live coordinators.

mod engine;
mod event;
mod reconnect;

pub use engine::SyncEngine;
pub use event::ChatEvent;
pub use reconnect::{mark_channels_stale, reconcile_stale_channels};
