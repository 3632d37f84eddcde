//! Sans-IO connection state machines.
//!
//! Three machines describe the client's connection lifecycle:
//!
//! - [`SocketState`]: the transport socket (`Idle → Pending → Connected → Disconnected`)
//! - [`UserState`]: the identity the client is connecting as
//! - [`ClientStatus`]: a user-facing summary derived from the other two
//!
//! The first two are driven by events through [`StateMachine::transition`], a
//! pure function from `(state, event)` to the next state. Every pair that the
//! transition table does not list is a [`TransitionError`]; nothing is silently
//! ignored. The machines perform no I/O, hold no locks and are replay-safe.
//! Serializing transitions on a shared instance is the caller's job (the
//! `chatsync` crate wraps each machine in a mutex-guarded cell).
//!
//! ```
//! use chatsync_proto::{SocketEvent, SocketState, StateMachine};
//!
//! let state = SocketState::Idle
//!     .transition(SocketEvent::ConnectionRequested)
//!     .and_then(|s| s.transition(SocketEvent::Connected("abc".into())))
//!     .unwrap();
//! assert_eq!(state, SocketState::Connected { connection_id: "abc".into() });
//! ```

mod client;
mod socket;
mod user;

pub use client::{ClientStatus, MissingStateData};
pub use socket::{SocketEvent, SocketState};
pub use user::{UserEvent, UserState};

use std::fmt::Debug;
use thiserror::Error;

/// A finite state machine with an explicit, closed event set.
pub trait StateMachine: Clone + Debug + Sized {
    /// Events this machine accepts.
    type Event: Debug;

    /// Short machine name used in diagnostics.
    const NAME: &'static str;

    /// Compute the state that follows `event`.
    ///
    /// Returns [`TransitionError`] when `(self, event)` has no handler.
    fn transition(&self, event: Self::Event) -> Result<Self, TransitionError>;
}

/// An event arrived for a state that has no handler for it.
///
/// This is a contract violation by whoever produced the event (transport or
/// identity provider), never a recoverable condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{machine}: cannot handle event {event} while in state {state}")]
pub struct TransitionError {
    pub machine: &'static str,
    pub state: String,
    pub event: String,
}

impl TransitionError {
    pub(crate) fn new<S: Debug, E: Debug>(machine: &'static str, state: &S, event: &E) -> Self {
        Self {
            machine,
            state: format!("{state:?}"),
            event: format!("{event:?}"),
        }
    }
}
