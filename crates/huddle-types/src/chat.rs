//! Direct and group conversations with their embedded message log.
//!
//! `Chat` is the stored shape (member ids only). `ChatView` is what clients
//! render: every member, the admin and every message sender resolved to a
//! [`ProfileSummary`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::media::ImageRef;
use crate::user::{ProfileSummary, UserId};

/// Maximum length (in characters) of a group name.
pub const MAX_GROUP_NAME_CHARS: usize = 50;

/// Minimum number of *other* participants when creating a group.
pub const MIN_GROUP_INVITEES: usize = 2;

/// Unique identifier for a chat, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub Uuid);

impl ChatId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ChatId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChatId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// A stored conversation.
///
/// `members` keeps join order and never holds duplicates. For groups,
/// `group_admin` is a member whenever `members` is non-empty; it is `None`
/// only once the last member has left.
#[derive(Debug, Clone)]
pub struct Chat {
    pub id: ChatId,
    pub is_group: bool,
    pub members: Vec<UserId>,
    pub group_name: Option<String>,
    pub group_photo: Option<ImageRef>,
    pub group_admin: Option<UserId>,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.members.contains(user_id)
    }

    pub fn is_admin(&self, user_id: &UserId) -> bool {
        self.group_admin.as_ref() == Some(user_id)
    }

    /// Every user id this chat references: members, admin and senders.
    pub fn referenced_users(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.members.clone();
        ids.extend(self.group_admin);
        ids.extend(self.messages.iter().map(|m| m.sender));
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Order-independent key for a member set: sorted ids joined by commas.
///
/// Two chats have the same membership exactly when their keys are equal.
pub fn member_key(members: &[UserId]) -> String {
    let mut ids: Vec<String> = members.iter().map(UserId::to_string).collect();
    ids.sort();
    ids.dedup();
    ids.join(",")
}

/// One entry in a chat's append-only log. Never empty: text, image, or both.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub sender: UserId,
    pub text: Option<String>,
    pub image: Option<ImageRef>,
    pub created_at: DateTime<Utc>,
}

/// A validated message about to be appended.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender: UserId,
    pub text: Option<String>,
    pub image: Option<ImageRef>,
}

impl NewMessage {
    pub fn into_message(self, now: DateTime<Utc>) -> Message {
        Message {
            id: Uuid::now_v7(),
            sender: self.sender,
            text: self.text,
            image: self.image,
            created_at: now,
        }
    }
}

/// Client-facing chat with every reference resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub id: ChatId,
    pub is_group_chat: bool,
    pub users: Vec<ProfileSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_photo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_photo_public_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_admin: Option<ProfileSummary>,
    pub messages: Vec<MessageView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatView {
    pub fn member_ids(&self) -> impl Iterator<Item = UserId> + '_ {
        self.users.iter().map(|u| u.id)
    }

    pub fn admin_id(&self) -> Option<UserId> {
        self.group_admin.as_ref().map(|a| a.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: Uuid,
    pub sender: ProfileSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_public_id: Option<String>,
    pub date: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Request payloads, one per operation. Field names follow the wire format.
// ---------------------------------------------------------------------------

/// `POST /chats`: message to a single recipient.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendDirectMessageRequest {
    #[serde(rename = "userId")]
    pub recipient_id: Option<String>,
    pub text: Option<String>,
}

/// `POST /chats/group`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateGroupRequest {
    #[serde(rename = "userIds", default, deserialize_with = "deserialize_id_list")]
    pub member_ids: Vec<String>,
    #[serde(rename = "groupName")]
    pub group_name: Option<String>,
}

/// `PUT /chats/group/newMessage`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupMessageRequest {
    #[serde(rename = "groupId", default)]
    pub group_id: String,
    pub text: Option<String>,
}

/// `PUT /chats/group/addUser` and `PUT /chats/group/removeUser`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupMemberRequest {
    #[serde(rename = "groupId", default)]
    pub group_id: String,
    #[serde(rename = "userId", default)]
    pub user_id: String,
}

/// `PUT /chats/group`: rename and/or replace the photo (photo is a staged upload).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditGroupRequest {
    #[serde(default)]
    pub id: String,
    pub name: Option<String>,
}

/// `PUT /chats/group/removephoto`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoveGroupPhotoRequest {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "photoPublicId")]
    pub photo_ref: Option<String>,
}

/// Accepts either a JSON array of ids or one comma-separated string
/// (the shape multipart forms produce).
fn deserialize_id_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdList {
        Joined(String),
        List(Vec<String>),
    }

    let ids = match Option::<IdList>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(IdList::Joined(joined)) => joined.split(',').map(str::to_string).collect(),
        Some(IdList::List(list)) => list,
    };
    Ok(ids
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect())
}
