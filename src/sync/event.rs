use chatsync_proto::{Channel, ChannelKey, Message, User};

/// Backend events delivered over an established connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    MessageNew(Message),
    MessageUpdated(Message),
    /// Carries the message with `deleted_at` set.
    MessageDeleted(Message),
    ChannelUpdated(Channel),
    ChannelDeleted(ChannelKey),
    UserUpdated(User),
}

impl ChatEvent {
    /// Static label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageNew(_) => "message.new",
            Self::MessageUpdated(_) => "message.updated",
            Self::MessageDeleted(_) => "message.deleted",
            Self::ChannelUpdated(_) => "channel.updated",
            Self::ChannelDeleted(_) => "channel.deleted",
            Self::UserUpdated(_) => "user.updated",
        }
    }
}
