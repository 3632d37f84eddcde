//! Composite client status derived from the socket and user machines.
//!
//! [`ClientStatus`] has no events of its own. It is recomputed from the two
//! underlying states every time either one changes.

use super::{SocketState, UserState};
use crate::model::{ConnectionId, User};
use thiserror::Error;

/// User-facing connection summary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClientStatus {
    /// No identity, or no connection wanted.
    #[default]
    Idle,
    /// Connection or identity confirmation in progress.
    Connecting { user: Option<User> },
    UserConnected {
        user: User,
        connection_id: ConnectionId,
    },
    AnonymousConnected {
        user: User,
        connection_id: ConnectionId,
    },
    /// Connection lost while an identity is still held.
    Disconnected { user: Option<User> },
}

/// An accessor was called while the status does not carry the requested datum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no {what} available while client is {status}")]
pub struct MissingStateData {
    pub what: &'static str,
    pub status: &'static str,
}

impl ClientStatus {
    /// Derive the summary from the current socket and user states.
    pub fn derive(socket: &SocketState, user: &UserState) -> Self {
        if matches!(user, UserState::NotSet) {
            return Self::Idle;
        }
        let held = user.user().cloned();
        match socket {
            SocketState::Idle => Self::Idle,
            SocketState::Pending => Self::Connecting { user: held },
            SocketState::Disconnected => Self::Disconnected { user: held },
            SocketState::Connected { connection_id } => match user {
                UserState::UserSet(u) => Self::UserConnected {
                    user: u.clone(),
                    connection_id: connection_id.clone(),
                },
                UserState::AnonymousSet(u) => Self::AnonymousConnected {
                    user: u.clone(),
                    connection_id: connection_id.clone(),
                },
                // Socket is up but the backend has not confirmed the identity.
                _ => Self::Connecting { user: held },
            },
        }
    }

    /// Short label used in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting { .. } => "connecting",
            Self::UserConnected { .. } => "user-connected",
            Self::AnonymousConnected { .. } => "anonymous-connected",
            Self::Disconnected { .. } => "disconnected",
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            Self::UserConnected { .. } | Self::AnonymousConnected { .. }
        )
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn current_user_or_fail(&self) -> Result<&User, MissingStateData> {
        match self {
            Self::UserConnected { user, .. } | Self::AnonymousConnected { user, .. } => Ok(user),
            Self::Connecting { user: Some(user) } | Self::Disconnected { user: Some(user) } => {
                Ok(user)
            }
            _ => Err(MissingStateData {
                what: "current user",
                status: self.name(),
            }),
        }
    }

    pub fn current_connection_id_or_fail(&self) -> Result<&str, MissingStateData> {
        match self {
            Self::UserConnected { connection_id, .. }
            | Self::AnonymousConnected { connection_id, .. } => Ok(connection_id),
            _ => Err(MissingStateData {
                what: "connection id",
                status: self.name(),
            }),
        }
    }
}
