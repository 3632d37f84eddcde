//! Unified error handling for chatsync.
//!
//! This module provides the top-level error returned by the sync engine and
//! the client state cells, with automatic conversions from each layer and
//! static labels for log fields.

use chatsync_proto::{MissingStateData, TransitionError};
use thiserror::Error;

pub use crate::repository::FlushError;
pub use crate::store::StoreError;

// ============================================================================
// Client Errors (engine and state operations)
// ============================================================================

/// Errors surfaced to callers of the sync core.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport or identity provider sent an event the machine cannot handle.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// An accessor required data the current client status does not carry.
    #[error(transparent)]
    MissingData(#[from] MissingStateData),

    /// A durable store read or flush failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A flush dropped its batch.
    #[error(transparent)]
    Flush(#[from] FlushError),

    /// A coordinator was asked to act after it was torn down.
    #[error("coordinator for {0} has been torn down")]
    TornDown(String),
}

impl ClientError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transition(_) => "illegal_transition",
            Self::MissingData(_) => "missing_state_data",
            Self::Store(_) => "store_error",
            Self::Flush(_) => "flush_error",
            Self::TornDown(_) => "torn_down",
        }
    }

    /// Contract violations indicate a bug in the event producer, not a runtime condition.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::Transition(_) | Self::MissingData(_))
    }
}

/// Result type for sync core operations.
pub type ClientResult<T> = Result<T, ClientError>;
