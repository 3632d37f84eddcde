//! Composite client state.

use super::{Committed, StateCell};
use crate::error::ClientResult;
use chatsync_proto::{ClientStatus, SocketEvent, SocketState, User, UserEvent, UserState};
use tokio::sync::watch;
use tracing::info;

/// Socket and user machines plus the status derived from them.
///
/// Each machine is serialized independently. The derived status is recomputed
/// from the latest committed pair after every successful transition, so it
/// never reflects a state that was not committed.
pub struct ClientState {
    socket: StateCell<SocketState>,
    user: StateCell<UserState>,
    status: watch::Sender<ClientStatus>,
}

impl ClientState {
    pub fn new() -> Self {
        let (status, _) = watch::channel(ClientStatus::Idle);
        Self {
            socket: StateCell::default(),
            user: StateCell::new(UserState::NotSet),
            status,
        }
    }

    /// Feed one transport event to the socket machine.
    pub fn on_socket_event(&self, event: SocketEvent) -> ClientResult<Committed<SocketState>> {
        let committed = self.socket.send_event(event)?;
        self.refresh_status();
        Ok(committed)
    }

    /// Feed one identity event to the user machine.
    pub fn on_user_event(&self, event: UserEvent) -> ClientResult<Committed<UserState>> {
        let committed = self.user.send_event(event)?;
        self.refresh_status();
        Ok(committed)
    }

    pub fn socket_state(&self) -> SocketState {
        self.socket.current()
    }

    pub fn user_state(&self) -> UserState {
        self.user.current()
    }

    pub fn status(&self) -> ClientStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ClientStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_socket(&self) -> watch::Receiver<SocketState> {
        self.socket.subscribe()
    }

    pub fn subscribe_user(&self) -> watch::Receiver<UserState> {
        self.user.subscribe()
    }

    pub fn current_user_or_fail(&self) -> ClientResult<User> {
        Ok(self.status.borrow().current_user_or_fail()?.clone())
    }

    pub fn current_connection_id_or_fail(&self) -> ClientResult<String> {
        Ok(self
            .status
            .borrow()
            .current_connection_id_or_fail()?
            .to_string())
    }

    fn refresh_status(&self) {
        // Derive inside the watch lock so concurrent refreshes publish in
        // the order they read the machines.
        self.status.send_if_modified(|status| {
            let next = ClientStatus::derive(&self.socket.current(), &self.user.current());
            if *status == next {
                return false;
            }
            info!(from = status.name(), to = next.name(), "Client status changed");
            *status = next;
            true
        });
    }
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new()
    }
}
