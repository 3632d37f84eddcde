//! Pure protocol types for the chatsync client core.
//!
//! Nothing in this crate performs I/O. It defines:
//! - [`model`]: the synchronized entities (users, channels, messages) and the
//!   value-equality keys used to address them
//! - [`fsm`]: the socket, user-identity and composite client state machines
//!
//! The async runtime, caching and persistence layers live in the `chatsync` crate.

#![deny(clippy::all)]

pub mod fsm;
pub mod model;

pub use fsm::{
    ClientStatus, MissingStateData, SocketEvent, SocketState, StateMachine, TransitionError,
    UserEvent, UserState,
};
pub use model::{
    Channel, ChannelKey, ConnectionId, Entity, Message, MessageId, QueryFilter, QuerySort,
    SortDirection, SortField, SortSpec, User, UserId,
};
