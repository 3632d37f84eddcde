//! Mutex-guarded machine cell.
//!
//! A [`StateCell`] linearizes transitions on one machine instance: the state
//! read by a transition is always the state the previous transition committed.
//! Every committed state is republished on a `watch` channel.

use chatsync_proto::{StateMachine, TransitionError};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{error, trace};

/// The state before and after one committed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed<M> {
    pub previous: M,
    pub current: M,
}

/// One machine instance behind a lock, with an observable current state.
pub struct StateCell<M: StateMachine> {
    state: Mutex<M>,
    tx: watch::Sender<M>,
}

impl<M> StateCell<M>
where
    M: StateMachine + Send + Sync + 'static,
{
    pub fn new(initial: M) -> Self {
        let (tx, _) = watch::channel(initial.clone());
        Self {
            state: Mutex::new(initial),
            tx,
        }
    }

    pub fn current(&self) -> M {
        self.state.lock().clone()
    }

    /// Apply `event` to the current state and commit the result.
    ///
    /// An illegal transition leaves the state untouched and is logged at
    /// error level before being returned.
    pub fn send_event(&self, event: M::Event) -> Result<Committed<M>, TransitionError> {
        let mut state = self.state.lock();
        match state.transition(event) {
            Ok(next) => {
                trace!(machine = M::NAME, from = ?*state, to = ?next, "Transition");
                let previous = std::mem::replace(&mut *state, next.clone());
                self.tx.send_replace(next.clone());
                Ok(Committed {
                    previous,
                    current: next,
                })
            }
            Err(e) => {
                error!(machine = M::NAME, error = %e, "Illegal state transition");
                Err(e)
            }
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<M> {
        self.tx.subscribe()
    }
}

impl<M> Default for StateCell<M>
where
    M: StateMachine + Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(M::default())
    }
}
