//! Integration test common infrastructure.
//!
//! Provides an engine wired to inspectable in-memory stores plus fixtures for
//! users, channels and messages.

pub mod harness;

#[allow(unused_imports)]
pub use harness::{TestEngine, alice, bob, general, message};
