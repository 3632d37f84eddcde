//! User repository.

use super::Repository;
use crate::store::{DurableStore, StoreError};
use chatsync_proto::{User, UserId};
use parking_lot::RwLock;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

/// User repository that also remembers which user is the local one.
pub struct UserRepository {
    users: Arc<Repository<User>>,
    current_user_id: RwLock<Option<UserId>>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn DurableStore<User>>, capacity: usize, flush_delay: Duration) -> Self {
        Self {
            users: Repository::new("users", store, capacity, flush_delay),
            current_user_id: RwLock::new(None),
        }
    }

    /// Record `user` as the local user and write it like any other user.
    pub fn insert_current_user(&self, user: User) {
        *self.current_user_id.write() = Some(user.id.clone());
        self.users.put(user);
    }

    pub fn current_user_id(&self) -> Option<UserId> {
        self.current_user_id.read().clone()
    }

    /// Forget which user is local; cached users stay.
    pub fn forget_current_user(&self) {
        *self.current_user_id.write() = None;
    }

    /// The local user, reading through to the store if it was evicted.
    pub async fn current_user(&self) -> Result<Option<User>, StoreError> {
        let Some(id) = self.current_user_id() else {
            return Ok(None);
        };
        self.users.get(&id).await
    }

    /// Clear the repository and forget the local user.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.forget_current_user();
        self.users.clear().await
    }
}

impl Deref for UserRepository {
    type Target = Repository<User>;

    fn deref(&self) -> &Self::Target {
        &self.users
    }
}
