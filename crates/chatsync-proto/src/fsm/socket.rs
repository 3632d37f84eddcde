//! Socket lifecycle machine.
//!
//! | state \ event  | ConnectionRequested | Connected(id)  | Disconnected | DisconnectRequested |
//! |-----------------|---------------------|----------------|--------------|---------------------|
//! | `Idle`          | `Pending`           | `Idle`         | `Idle`       | `Idle`              |
//! | `Pending`       | error               | `Connected(id)`| `Pending`    | `Idle`              |
//! | `Connected`     | error               | `Connected(id)`| `Disconnected`| `Idle`             |
//! | `Disconnected`  | `Pending`           | `Connected(id)`| `Disconnected`| `Idle`             |
//!
//! `ForceDisconnect` is accepted in every state and always lands in `Idle`.

use super::{StateMachine, TransitionError};
use crate::model::ConnectionId;

/// State of the transport socket.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SocketState {
    /// No connection wanted.
    #[default]
    Idle,
    /// Connection requested, waiting for the backend handshake.
    Pending,
    /// Handshake complete; the backend assigned `connection_id`.
    Connected { connection_id: ConnectionId },
    /// Connection lost without the client asking for it.
    Disconnected,
}

/// Events produced by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    ConnectionRequested,
    Connected(ConnectionId),
    Disconnected,
    DisconnectRequested,
    /// Unrecoverable socket error; tear everything down.
    ForceDisconnect,
}

impl SocketState {
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Connection id if connected.
    pub fn connection_id(&self) -> Option<&str> {
        match self {
            Self::Connected { connection_id } => Some(connection_id),
            _ => None,
        }
    }
}

impl StateMachine for SocketState {
    type Event = SocketEvent;

    const NAME: &'static str = "socket";

    fn transition(&self, event: SocketEvent) -> Result<Self, TransitionError> {
        use SocketEvent as E;
        use SocketState as S;

        let next = match (self, &event) {
            (_, E::ForceDisconnect) => S::Idle,

            (S::Idle, E::ConnectionRequested) => S::Pending,
            (S::Idle, E::Disconnected | E::DisconnectRequested | E::Connected(_)) => S::Idle,

            (S::Pending, E::Connected(id)) => S::Connected {
                connection_id: id.clone(),
            },
            (S::Pending, E::Disconnected) => S::Pending,
            (S::Pending, E::DisconnectRequested) => S::Idle,

            (S::Connected { .. }, E::Disconnected) => S::Disconnected,
            (S::Connected { .. }, E::DisconnectRequested) => S::Idle,
            (S::Connected { .. }, E::Connected(id)) => S::Connected {
                connection_id: id.clone(),
            },

            (S::Disconnected, E::Disconnected) => S::Disconnected,
            (S::Disconnected, E::DisconnectRequested) => S::Idle,
            (S::Disconnected, E::ConnectionRequested) => S::Pending,
            (S::Disconnected, E::Connected(id)) => S::Connected {
                connection_id: id.clone(),
            },

            (S::Pending | S::Connected { .. }, E::ConnectionRequested) => {
                return Err(TransitionError::new(Self::NAME, self, &event));
            }
        };
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(events: impl IntoIterator<Item = SocketEvent>) -> Result<SocketState, TransitionError> {
        events
            .into_iter()
            .try_fold(SocketState::Idle, |state, event| state.transition(event))
    }

    fn connected(id: &str) -> SocketState {
        SocketState::Connected {
            connection_id: id.to_string(),
        }
    }

    #[test]
    fn test_default_is_idle() {
        assert_eq!(SocketState::default(), SocketState::Idle);
    }

    #[test]
    fn test_connect_sequence() {
        let state = run([
            SocketEvent::ConnectionRequested,
            SocketEvent::Connected("abc".into()),
        ])
        .unwrap();
        assert_eq!(state, connected("abc"));
        assert_eq!(state.connection_id(), Some("abc"));
    }

    #[test]
    fn test_idle_self_loops() {
        for event in [
            SocketEvent::Disconnected,
            SocketEvent::DisconnectRequested,
            SocketEvent::Connected("x".into()),
        ] {
            assert_eq!(SocketState::Idle.transition(event).unwrap(), SocketState::Idle);
        }
    }

    #[test]
    fn test_pending_transitions() {
        let pending = SocketState::Pending;
        assert_eq!(
            pending.transition(SocketEvent::Disconnected).unwrap(),
            SocketState::Pending
        );
        assert_eq!(
            pending.transition(SocketEvent::DisconnectRequested).unwrap(),
            SocketState::Idle
        );
        assert!(pending.transition(SocketEvent::ConnectionRequested).is_err());
    }

    #[test]
    fn test_connected_transitions() {
        let state = connected("c1");
        assert_eq!(
            state.transition(SocketEvent::Disconnected).unwrap(),
            SocketState::Disconnected
        );
        assert_eq!(
            state.transition(SocketEvent::DisconnectRequested).unwrap(),
            SocketState::Idle
        );
        assert_eq!(
            state.transition(SocketEvent::Connected("c2".into())).unwrap(),
            connected("c2")
        );
        let err = state.transition(SocketEvent::ConnectionRequested).unwrap_err();
        assert_eq!(err.machine, "socket");
        assert!(err.to_string().contains("cannot handle event ConnectionRequested"));
    }

    #[test]
    fn test_disconnected_transitions() {
        let state = SocketState::Disconnected;
        assert_eq!(
            state.transition(SocketEvent::Disconnected).unwrap(),
            SocketState::Disconnected
        );
        assert_eq!(
            state.transition(SocketEvent::DisconnectRequested).unwrap(),
            SocketState::Idle
        );
        assert_eq!(
            state.transition(SocketEvent::ConnectionRequested).unwrap(),
            SocketState::Pending
        );
        assert_eq!(
            state.transition(SocketEvent::Connected("c3".into())).unwrap(),
            connected("c3")
        );
    }

    #[test]
    fn test_force_disconnect_from_every_state() {
        for state in [
            SocketState::Idle,
            SocketState::Pending,
            connected("c1"),
            SocketState::Disconnected,
        ] {
            assert_eq!(
                state.transition(SocketEvent::ForceDisconnect).unwrap(),
                SocketState::Idle
            );
        }
    }

    #[test]
    fn test_reconnect_scenario() {
        let state = run([
            SocketEvent::ConnectionRequested,
            SocketEvent::Connected("c1".into()),
            SocketEvent::Disconnected,
            SocketEvent::ConnectionRequested,
            SocketEvent::Connected("c2".into()),
        ])
        .unwrap();
        assert_eq!(state, connected("c2"));
    }

    #[test]
    fn test_error_does_not_change_input_state() {
        let state = SocketState::Pending;
        let _ = state.transition(SocketEvent::ConnectionRequested);
        assert_eq!(state, SocketState::Pending);
    }
}
