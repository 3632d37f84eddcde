//! User-identity lifecycle machine.
//!
//! The identity is held by value inside the state. A new `ConnectUser` or
//! `ConnectAnonymous` replaces whatever was held; fields are never merged.

use super::{StateMachine, TransitionError};
use crate::model::User;

/// Identity the client is connecting (or connected) as.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UserState {
    #[default]
    NotSet,
    /// `connect_user` called, backend has not confirmed yet.
    Pending(User),
    /// `connect_anonymous` called, backend has not minted the guest yet.
    AnonymousPending,
    UserSet(User),
    AnonymousSet(User),
}

/// Events produced by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    ConnectUser(User),
    ConnectAnonymous,
    /// Backend acknowledged the pending identity and returned its view of it.
    UserConfirmed(User),
    UserUpdated(User),
    Logout,
    UserSetFailed,
}

impl UserState {
    /// Held identity, if any.
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Pending(user) | Self::UserSet(user) | Self::AnonymousSet(user) => Some(user),
            Self::NotSet | Self::AnonymousPending => None,
        }
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        matches!(self, Self::UserSet(_) | Self::AnonymousSet(_))
    }

    #[inline]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::AnonymousPending | Self::AnonymousSet(_))
    }
}

impl StateMachine for UserState {
    type Event = UserEvent;

    const NAME: &'static str = "user";

    fn transition(&self, event: UserEvent) -> Result<Self, TransitionError> {
        use UserEvent as E;
        use UserState as S;

        let next = match (self, &event) {
            (_, E::Logout | E::UserSetFailed) => S::NotSet,
            (_, E::ConnectUser(user)) => S::Pending(user.clone()),
            (_, E::ConnectAnonymous) => S::AnonymousPending,

            (S::Pending(_) | S::UserSet(_), E::UserConfirmed(user)) => S::UserSet(user.clone()),
            (S::AnonymousPending | S::AnonymousSet(_), E::UserConfirmed(user)) => {
                S::AnonymousSet(user.clone())
            }

            (S::Pending(_), E::UserUpdated(user)) => S::Pending(user.clone()),
            (S::UserSet(_), E::UserUpdated(user)) => S::UserSet(user.clone()),
            (S::AnonymousSet(_), E::UserUpdated(user)) => S::AnonymousSet(user.clone()),

            (S::NotSet, E::UserConfirmed(_) | E::UserUpdated(_))
            | (S::AnonymousPending, E::UserUpdated(_)) => {
                return Err(TransitionError::new(Self::NAME, self, &event));
            }
        };
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User::new("alice", "Alice")
    }

    #[test]
    fn test_connect_then_confirm() {
        let state = UserState::NotSet
            .transition(UserEvent::ConnectUser(alice()))
            .unwrap();
        assert_eq!(state, UserState::Pending(alice()));
        let state = state.transition(UserEvent::UserConfirmed(alice())).unwrap();
        assert_eq!(state, UserState::UserSet(alice()));
        assert!(state.is_set());
    }

    #[test]
    fn test_anonymous_flow() {
        let guest = User::new("!anon-1", "");
        let state = UserState::NotSet
            .transition(UserEvent::ConnectAnonymous)
            .and_then(|s| s.transition(UserEvent::UserConfirmed(guest.clone())))
            .unwrap();
        assert_eq!(state, UserState::AnonymousSet(guest));
        assert!(state.is_anonymous());
    }

    #[test]
    fn test_update_while_not_set_fails() {
        let err = UserState::NotSet
            .transition(UserEvent::UserUpdated(alice()))
            .unwrap_err();
        assert_eq!(err.machine, "user");
        assert_eq!(err.state, "NotSet");
    }

    #[test]
    fn test_confirm_while_not_set_fails() {
        assert!(UserState::NotSet
            .transition(UserEvent::UserConfirmed(alice()))
            .is_err());
    }

    #[test]
    fn test_update_while_anonymous_pending_fails() {
        assert!(UserState::AnonymousPending
            .transition(UserEvent::UserUpdated(alice()))
            .is_err());
    }

    #[test]
    fn test_set_failed_always_resets() {
        for state in [
            UserState::NotSet,
            UserState::Pending(alice()),
            UserState::AnonymousPending,
            UserState::UserSet(alice()),
            UserState::AnonymousSet(alice()),
        ] {
            assert_eq!(
                state.transition(UserEvent::UserSetFailed).unwrap(),
                UserState::NotSet
            );
        }
    }

    #[test]
    fn test_update_replaces_identity() {
        let renamed = alice().with_name("Alicia");
        let state = UserState::UserSet(alice())
            .transition(UserEvent::UserUpdated(renamed.clone()))
            .unwrap();
        assert_eq!(state.user(), Some(&renamed));
    }

    #[test]
    fn test_connect_user_replaces_wholesale() {
        let bob = User::new("bob", "Bob");
        let state = UserState::UserSet(alice())
            .transition(UserEvent::ConnectUser(bob.clone()))
            .unwrap();
        assert_eq!(state, UserState::Pending(bob));
    }

    #[test]
    fn test_logout_resets() {
        let state = UserState::UserSet(alice())
            .transition(UserEvent::Logout)
            .unwrap();
        assert_eq!(state, UserState::NotSet);
        assert_eq!(state.user(), None);
    }
}
