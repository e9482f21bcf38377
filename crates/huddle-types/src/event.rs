//! Live events pushed over the per-user event channel.
//!
//! Serialized as JSON objects tagged by `event`. Delivery is fire-and-forget:
//! a recipient with no open connection simply never sees the event.

use serde::{Deserialize, Serialize};

use crate::chat::{ChatId, ChatView};
use crate::user::UserId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LiveEvent {
    /// A direct or group message was appended.
    MessageReceived { chat: ChatView },

    /// The recipient was made a member of a new group.
    GroupCreated { chat: ChatView },

    /// The group name and/or photo changed.
    GroupEdited { chat: ChatView },

    /// The group photo was reset to the placeholder.
    GroupPhotoRemoved { chat: ChatView },

    /// The recipient was added to an existing group.
    AddedToGroup { chat: ChatView },

    /// Someone else was added to a group the recipient belongs to.
    OtherUserAdded { chat: ChatView, user_id: UserId },

    /// The recipient was removed from a group.
    RemovedFromGroup { chat: ChatView },

    /// Someone else was removed from a group the recipient belongs to.
    OtherUserRemoved { chat: ChatView, user_id: UserId },

    /// A member left a group the recipient belongs to.
    UserLeft { chat: ChatView, user_id: UserId },

    /// Ephemeral: `user_id` started typing in `chat_id`.
    TypingStarted {
        chat_id: ChatId,
        user_id: UserId,
        name: String,
    },

    /// Ephemeral: `user_id` stopped typing in `chat_id`.
    TypingStopped { chat_id: ChatId, user_id: UserId },
}

impl LiveEvent {
    /// Wire name of the event, as it appears in the `event` tag.
    pub fn name(&self) -> &'static str {
        match self {
            LiveEvent::MessageReceived { .. } => "message_received",
            LiveEvent::GroupCreated { .. } => "group_created",
            LiveEvent::GroupEdited { .. } => "group_edited",
            LiveEvent::GroupPhotoRemoved { .. } => "group_photo_removed",
            LiveEvent::AddedToGroup { .. } => "added_to_group",
            LiveEvent::OtherUserAdded { .. } => "other_user_added",
            LiveEvent::RemovedFromGroup { .. } => "removed_from_group",
            LiveEvent::OtherUserRemoved { .. } => "other_user_removed",
            LiveEvent::UserLeft { .. } => "user_left",
            LiveEvent::TypingStarted { .. } => "typing_started",
            LiveEvent::TypingStopped { .. } => "typing_stopped",
        }
    }
}
