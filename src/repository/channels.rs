//! Channel repository.

use super::Repository;
use crate::store::StoreError;
use chatsync_proto::{Channel, ChannelKey, Message};

pub type ChannelRepository = Repository<Channel>;

impl Repository<Channel> {
    /// Bump `last_message_at` of the message's channel if `message` is newer.
    ///
    /// Returns the updated channel, or `None` if the channel is unknown,
    /// deleted or already newer.
    pub async fn update_last_message(
        &self,
        message: &Message,
    ) -> Result<Option<Channel>, StoreError> {
        let Some(mut channel) = self.get(&message.cid).await? else {
            return Ok(None);
        };
        if channel.is_deleted()
            || channel
                .last_message_at
                .is_some_and(|at| at >= message.created_at)
        {
            return Ok(None);
        }
        channel.last_message_at = Some(message.created_at);
        self.put(channel.clone());
        Ok(Some(channel))
    }

    /// Set the hidden flag of a known channel.
    pub async fn set_hidden(&self, key: &ChannelKey, hidden: bool) -> Result<bool, StoreError> {
        let Some(mut channel) = self.get(key).await?.filter(|c| !c.is_deleted()) else {
            return Ok(false);
        };
        channel.hidden = hidden;
        self.put(channel);
        Ok(true)
    }
}
