//! Conversation manager.
//!
//! Validates and executes every chat action, resolves the stored chat into
//! the [`ChatView`] clients render, and, only after the store has committed,
//! hands the result to the fanout policy and the presence router.
//!
//! Rule violations are detected before any side effect. Uploads happen after
//! validation; an upload that ends up unreferenced (because the commit
//! failed) is discarded on a best-effort basis.

use std::collections::HashMap;
use std::sync::Arc;

use huddle_types::chat::{
    Chat, ChatId, ChatView, CreateGroupRequest, EditGroupRequest, GroupMemberRequest,
    GroupMessageRequest, MAX_GROUP_NAME_CHARS, MIN_GROUP_INVITEES, MessageView, NewMessage,
    RemoveGroupPhotoRequest, SendDirectMessageRequest,
};
use huddle_types::error::{ChatError, RepositoryError};
use huddle_types::event::LiveEvent;
use huddle_types::media::ImageRef;
use huddle_types::user::{ProfileSummary, UserId};
use tracing::{debug, info, warn};

use crate::live::fanout::{self, ChatAction};
use crate::live::router::PresenceRouter;
use crate::repository::chat::{ChatRepository, GroupPatch, Removal};
use crate::repository::user::UserRepository;
use crate::service::media::MediaService;
use crate::storage::object_store::ObjectStore;
use crate::storage::staged::StagedImage;

const USER_NOT_FOUND: &str = "User not found.";
const GROUP_NOT_FOUND: &str = "Group not found.";
const EMPTY_MESSAGE: &str = "Write a message or provide an image.";
const NOT_A_MEMBER: &str = "You are not a member of this group.";
const ADD_FORBIDDEN: &str = "Only group admin can add participants.";
const REMOVE_FORBIDDEN: &str = "Only group admin can remove participants.";
const EDIT_FORBIDDEN: &str = "Only group admin can edit group details.";
const PHOTO_FORBIDDEN: &str = "Only group admin can remove photo.";

fn upstream(err: RepositoryError) -> ChatError {
    ChatError::Upstream(err.to_string())
}

/// Trimmed text, or `None` when nothing is left.
fn normalize_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn parse_user_id(raw: &str) -> Result<UserId, ChatError> {
    raw.parse()
        .map_err(|_| ChatError::Validation(USER_NOT_FOUND.to_string()))
}

fn parse_group_id(raw: &str) -> Result<ChatId, ChatError> {
    raw.parse()
        .map_err(|_| ChatError::NotFound(GROUP_NOT_FOUND.to_string()))
}

/// Service orchestrating direct chats and groups.
///
/// Generic over repository and storage traits; huddle-core never depends on
/// huddle-infra.
pub struct ConversationManager<C: ChatRepository, U: UserRepository, O: ObjectStore> {
    chats: C,
    users: U,
    media: MediaService<O>,
    router: Arc<PresenceRouter>,
    default_group_photo: String,
}

impl<C: ChatRepository, U: UserRepository, O: ObjectStore> ConversationManager<C, U, O> {
    /// - `default_group_photo`: placeholder URL for groups without a photo
    pub fn new(
        chats: C,
        users: U,
        media: MediaService<O>,
        router: Arc<PresenceRouter>,
        default_group_photo: impl Into<String>,
    ) -> Self {
        Self {
            chats,
            users,
            media,
            router,
            default_group_photo: default_group_photo.into(),
        }
    }

    // -----------------------------------------------------------------------
    // Direct chats
    // -----------------------------------------------------------------------

    /// Append a message to the direct chat between `actor` and the
    /// recipient, creating the chat on first contact.
    pub async fn send_direct_message(
        &self,
        actor: UserId,
        request: SendDirectMessageRequest,
        image: Option<StagedImage>,
    ) -> Result<ChatView, ChatError> {
        let raw_recipient = request
            .recipient_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ChatError::Validation(USER_NOT_FOUND.to_string()))?;
        let text = normalize_text(request.text);
        if text.is_none() && image.is_none() {
            return Err(ChatError::Validation(EMPTY_MESSAGE.to_string()));
        }

        let recipient = parse_user_id(raw_recipient)?;
        if recipient == actor {
            return Err(ChatError::Validation(
                "Message cannot be sent to yourself.".to_string(),
            ));
        }
        if self
            .users
            .get_by_id(&recipient)
            .await
            .map_err(upstream)?
            .is_none()
        {
            return Err(ChatError::Validation(USER_NOT_FOUND.to_string()));
        }

        let image = self.media.store_optional(image).await?;
        let message = NewMessage {
            sender: actor,
            text,
            image: image.clone(),
        };

        let chat = match self
            .chats
            .append_direct_message(&actor, &recipient, message)
            .await
        {
            Ok(chat) => chat,
            Err(e) => {
                self.discard_optional(image.as_ref()).await;
                return Err(upstream(e));
            }
        };

        debug!(chat_id = %chat.id, %actor, %recipient, "direct message appended");
        let view = self.resolve(&chat).await?;
        self.notify(ChatAction::MessageAppended { actor }, &view);
        Ok(view)
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    /// Create a group of `actor` plus at least two other distinct users.
    /// `actor` becomes admin and is appended after the invitees.
    pub async fn create_group(
        &self,
        actor: UserId,
        request: CreateGroupRequest,
        photo: Option<StagedImage>,
    ) -> Result<ChatView, ChatError> {
        let mut invitees = Vec::with_capacity(request.member_ids.len());
        for raw in &request.member_ids {
            let id = raw
                .parse::<UserId>()
                .map_err(|_| ChatError::Validation("User/s not found.".to_string()))?;
            if !invitees.contains(&id) {
                invitees.push(id);
            }
        }

        if invitees.contains(&actor) {
            return Err(ChatError::Validation(
                "You are already in the group.".to_string(),
            ));
        }
        if invitees.len() < MIN_GROUP_INVITEES {
            return Err(ChatError::Validation(
                "Please add at least two other participants.".to_string(),
            ));
        }
        let name = request
            .group_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ChatError::Validation("Please choose a group name.".to_string()))?;
        if name.chars().count() > MAX_GROUP_NAME_CHARS {
            return Err(ChatError::Validation(
                "Group name length should be 1-50 characters.".to_string(),
            ));
        }

        let found = self.users.summaries(&invitees).await.map_err(upstream)?;
        if found.len() != invitees.len() {
            return Err(ChatError::Validation("User/s not found.".to_string()));
        }

        let mut members = invitees;
        members.push(actor);
        if self
            .chats
            .find_group_by_members(&members)
            .await
            .map_err(upstream)?
            .is_some()
        {
            return Err(ChatError::DuplicateGroup);
        }

        let photo = match self.media.store_optional(photo).await? {
            Some(stored) => stored,
            None => ImageRef::placeholder(self.default_group_photo.clone()),
        };

        let now = chrono::Utc::now();
        let group = Chat {
            id: ChatId::new(),
            is_group: true,
            members,
            group_name: Some(name.to_string()),
            group_photo: Some(photo.clone()),
            group_admin: Some(actor),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let group = match self.chats.create_group(&group).await {
            Ok(group) => group,
            Err(e) => {
                self.media.discard(&photo).await;
                return Err(match e {
                    RepositoryError::Conflict(_) => ChatError::DuplicateGroup,
                    other => upstream(other),
                });
            }
        };

        info!(chat_id = %group.id, admin = %actor, members = group.members.len(), "group created");
        let view = self.resolve(&group).await?;
        self.notify(ChatAction::GroupCreated, &view);
        Ok(view)
    }

    /// Append a message to a group the actor belongs to.
    pub async fn append_group_message(
        &self,
        actor: UserId,
        request: GroupMessageRequest,
        image: Option<StagedImage>,
    ) -> Result<ChatView, ChatError> {
        let text = normalize_text(request.text);
        if text.is_none() && image.is_none() {
            return Err(ChatError::Validation(EMPTY_MESSAGE.to_string()));
        }

        let group = self.load_group(&request.group_id).await?;
        if !group.is_member(&actor) {
            return Err(ChatError::NotMember(NOT_A_MEMBER.to_string()));
        }

        let image = self.media.store_optional(image).await?;
        let message = NewMessage {
            sender: actor,
            text,
            image: image.clone(),
        };
        let group = match self.chats.append_message(&group.id, message).await {
            Ok(group) => group,
            Err(e) => {
                self.discard_optional(image.as_ref()).await;
                return Err(upstream(e));
            }
        };

        debug!(chat_id = %group.id, %actor, "group message appended");
        let view = self.resolve(&group).await?;
        self.notify(ChatAction::MessageAppended { actor }, &view);
        Ok(view)
    }

    /// Admin adds an existing user to the group.
    pub async fn add_member(
        &self,
        actor: UserId,
        request: GroupMemberRequest,
    ) -> Result<ChatView, ChatError> {
        let (group, user_id) = self.load_group_and_user(&request).await?;
        if !group.is_admin(&actor) {
            return Err(ChatError::Forbidden(ADD_FORBIDDEN.to_string()));
        }
        if group.is_member(&user_id) {
            return Err(ChatError::AlreadyMember);
        }

        let group = self
            .chats
            .add_member(&group.id, &user_id, &actor)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => ChatError::AlreadyMember,
                RepositoryError::Precondition(_) => ChatError::Forbidden(ADD_FORBIDDEN.to_string()),
                other => upstream(other),
            })?;

        info!(chat_id = %group.id, %user_id, "member added");
        let view = self.resolve(&group).await?;
        self.notify(ChatAction::MemberAdded { user_id }, &view);
        Ok(view)
    }

    /// Admin removes another member. The admin role is untouched; an admin
    /// who wants out uses [`Self::leave_group`].
    pub async fn remove_member(
        &self,
        actor: UserId,
        request: GroupMemberRequest,
    ) -> Result<ChatView, ChatError> {
        let (group, user_id) = self.load_group_and_user(&request).await?;
        if !group.is_admin(&actor) {
            return Err(ChatError::Forbidden(REMOVE_FORBIDDEN.to_string()));
        }
        if user_id == actor {
            return Err(ChatError::Validation(
                "Admins leave the group instead of removing themselves.".to_string(),
            ));
        }
        if !group.is_member(&user_id) {
            return Err(ChatError::NotMember(
                "Participant is not in the group.".to_string(),
            ));
        }

        let group = self
            .chats
            .remove_member(&group.id, &user_id, Removal::ByAdmin(actor))
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => {
                    ChatError::NotMember("Participant is not in the group.".to_string())
                }
                RepositoryError::Precondition(_) => {
                    ChatError::Forbidden(REMOVE_FORBIDDEN.to_string())
                }
                other => upstream(other),
            })?;

        info!(chat_id = %group.id, %user_id, "member removed");
        let view = self.resolve(&group).await?;
        self.notify(ChatAction::MemberRemoved { user_id }, &view);
        Ok(view)
    }

    /// Admin renames the group and/or replaces its photo.
    ///
    /// A replaced photo goes through upload new, delete old, commit. If the
    /// old object cannot be deleted the new upload is discarded and the group
    /// is left unchanged.
    pub async fn edit_group(
        &self,
        actor: UserId,
        request: EditGroupRequest,
        photo: Option<StagedImage>,
    ) -> Result<ChatView, ChatError> {
        let group = self.load_group(&request.id).await?;
        if !group.is_admin(&actor) {
            return Err(ChatError::Forbidden(EDIT_FORBIDDEN.to_string()));
        }

        let name = match request.name {
            Some(raw) => {
                let trimmed = raw.trim();
                let len = trimmed.chars().count();
                if len == 0 || len > MAX_GROUP_NAME_CHARS {
                    return Err(ChatError::Validation(
                        "Group name length should be 1-50 characters.".to_string(),
                    ));
                }
                Some(trimmed.to_string())
            }
            None => None,
        };
        if name.is_none() && photo.is_none() {
            return Err(ChatError::Validation(
                "Provide a new group name or photo.".to_string(),
            ));
        }
        let new_photo = self.media.store_optional(photo).await?;
        if let (Some(fresh), Some(old)) = (&new_photo, &group.group_photo) {
            if let Err(e) = self.media.delete(old).await {
                warn!(chat_id = %group.id, error = %e, "could not delete previous group photo");
                self.media.discard(fresh).await;
                return Err(e.into());
            }
        }

        let patch = GroupPatch {
            name,
            photo: new_photo.clone(),
        };
        let group = match self.chats.update_group(&group.id, patch, &actor).await {
            Ok(group) => group,
            Err(e) => {
                self.discard_optional(new_photo.as_ref()).await;
                return Err(match e {
                    RepositoryError::Precondition(_) => {
                        ChatError::Forbidden(EDIT_FORBIDDEN.to_string())
                    }
                    other => upstream(other),
                });
            }
        };

        info!(chat_id = %group.id, "group edited");
        let view = self.resolve(&group).await?;
        self.notify(ChatAction::GroupEdited, &view);
        Ok(view)
    }

    /// Admin resets the group photo to the placeholder.
    ///
    /// `photo_ref` must name the stored photo. A group already on the
    /// placeholder is reset without touching object storage.
    pub async fn remove_group_photo(
        &self,
        actor: UserId,
        request: RemoveGroupPhotoRequest,
    ) -> Result<ChatView, ChatError> {
        let group = self.load_group(&request.id).await?;
        if !group.is_admin(&actor) {
            return Err(ChatError::Forbidden(PHOTO_FORBIDDEN.to_string()));
        }

        if let Some(current) = group.group_photo.as_ref().filter(|p| !p.is_placeholder()) {
            let supplied = request.photo_ref.as_deref().map(str::trim);
            if supplied != current.delete_ref.as_deref() {
                return Err(ChatError::Validation(
                    "Photo reference does not match the group photo.".to_string(),
                ));
            }
            self.media.delete(current).await?;
        }

        let patch = GroupPatch {
            name: None,
            photo: Some(ImageRef::placeholder(self.default_group_photo.clone())),
        };
        let group = self
            .chats
            .update_group(&group.id, patch, &actor)
            .await
            .map_err(|e| match e {
                RepositoryError::Precondition(_) => {
                    ChatError::Forbidden(PHOTO_FORBIDDEN.to_string())
                }
                other => upstream(other),
            })?;

        info!(chat_id = %group.id, "group photo removed");
        let view = self.resolve(&group).await?;
        self.notify(ChatAction::GroupPhotoRemoved, &view);
        Ok(view)
    }

    /// The actor leaves. When the admin leaves, the earliest-joined remaining
    /// member takes over; the last member out leaves an adminless, empty
    /// group behind.
    pub async fn leave_group(&self, actor: UserId, group_id: &str) -> Result<ChatView, ChatError> {
        let group = self.load_group(group_id).await?;
        if !group.is_member(&actor) {
            return Err(ChatError::NotMember(NOT_A_MEMBER.to_string()));
        }

        let group = self
            .chats
            .remove_member(&group.id, &actor, Removal::Leave)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => ChatError::NotMember(NOT_A_MEMBER.to_string()),
                other => upstream(other),
            })?;

        info!(
            chat_id = %group.id,
            %actor,
            new_admin = ?group.group_admin,
            remaining = group.members.len(),
            "member left group"
        );
        let view = self.resolve(&group).await?;
        self.notify(ChatAction::MemberLeft { user_id: actor }, &view);
        Ok(view)
    }

    // -----------------------------------------------------------------------
    // Queries and ephemera
    // -----------------------------------------------------------------------

    /// Every chat `user` belongs to, most recently updated first.
    pub async fn list_chats(&self, user: UserId) -> Result<Vec<ChatView>, ChatError> {
        let chats = self.chats.list_for_user(&user).await.map_err(upstream)?;

        let mut ids: Vec<UserId> = chats.iter().flat_map(Chat::referenced_users).collect();
        ids.sort();
        ids.dedup();
        let profiles = self.profiles(&ids).await?;

        Ok(chats.iter().map(|chat| build_view(chat, &profiles)).collect())
    }

    /// Relay a typing indicator to the other members of a chat.
    /// Returns the number of connections reached.
    pub async fn broadcast_typing(
        &self,
        actor: UserId,
        chat_id: &ChatId,
        started: bool,
    ) -> Result<usize, ChatError> {
        let chat = self
            .chats
            .get(chat_id)
            .await
            .map_err(upstream)?
            .ok_or_else(|| ChatError::NotFound("Chat not found.".to_string()))?;
        if !chat.is_member(&actor) {
            return Err(ChatError::NotMember(
                "You are not a member of this chat.".to_string(),
            ));
        }

        let event = if started {
            let name = self
                .users
                .get_by_id(&actor)
                .await
                .map_err(upstream)?
                .map(|u| u.name)
                .unwrap_or_default();
            LiveEvent::TypingStarted {
                chat_id: chat.id,
                user_id: actor,
                name,
            }
        } else {
            LiveEvent::TypingStopped {
                chat_id: chat.id,
                user_id: actor,
            }
        };
        let targets = fanout::typing_targets(&chat.members, &actor);
        Ok(self.router.broadcast(&targets, &event))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn load_group(&self, raw_id: &str) -> Result<Chat, ChatError> {
        let id = parse_group_id(raw_id)?;
        self.chats
            .get(&id)
            .await
            .map_err(upstream)?
            .filter(|chat| chat.is_group)
            .ok_or_else(|| ChatError::NotFound(GROUP_NOT_FOUND.to_string()))
    }

    async fn load_group_and_user(
        &self,
        request: &GroupMemberRequest,
    ) -> Result<(Chat, UserId), ChatError> {
        let group = self.load_group(&request.group_id).await?;
        let user_id: UserId = request
            .user_id
            .parse()
            .map_err(|_| ChatError::NotFound(USER_NOT_FOUND.to_string()))?;
        if self
            .users
            .get_by_id(&user_id)
            .await
            .map_err(upstream)?
            .is_none()
        {
            return Err(ChatError::NotFound(USER_NOT_FOUND.to_string()));
        }
        Ok((group, user_id))
    }

    async fn profiles(&self, ids: &[UserId]) -> Result<HashMap<UserId, ProfileSummary>, ChatError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let summaries = self.users.summaries(ids).await.map_err(upstream)?;
        Ok(summaries.into_iter().map(|s| (s.id, s)).collect())
    }

    async fn resolve(&self, chat: &Chat) -> Result<ChatView, ChatError> {
        let profiles = self.profiles(&chat.referenced_users()).await?;
        Ok(build_view(chat, &profiles))
    }

    async fn discard_optional(&self, image: Option<&ImageRef>) {
        if let Some(image) = image {
            self.media.discard(image).await;
        }
    }

    fn notify(&self, action: ChatAction, view: &ChatView) {
        for delivery in fanout::plan(&action, view) {
            let delivered = self.router.broadcast(&delivery.targets, &delivery.event);
            debug!(
                chat_id = %view.id,
                event = delivery.event.name(),
                targets = delivery.targets.len(),
                delivered,
                "fanout"
            );
        }
    }
}

/// Assemble the client view from a stored chat and resolved profiles.
/// References that no longer resolve render as [`ProfileSummary::unknown`].
fn build_view(chat: &Chat, profiles: &HashMap<UserId, ProfileSummary>) -> ChatView {
    let profile = |id: &UserId| {
        profiles
            .get(id)
            .cloned()
            .unwrap_or_else(|| ProfileSummary::unknown(*id))
    };

    ChatView {
        id: chat.id,
        is_group_chat: chat.is_group,
        users: chat.members.iter().map(profile).collect(),
        group_name: chat.group_name.clone(),
        group_photo: chat.group_photo.as_ref().map(|p| p.url.clone()),
        group_photo_public_id: chat.group_photo.as_ref().and_then(|p| p.delete_ref.clone()),
        group_admin: chat.group_admin.as_ref().map(profile),
        messages: chat
            .messages
            .iter()
            .map(|m| MessageView {
                id: m.id,
                sender: profile(&m.sender),
                text: m.text.clone(),
                image: m.image.as_ref().map(|i| i.url.clone()),
                image_public_id: m.image.as_ref().and_then(|i| i.delete_ref.clone()),
                date: m.created_at,
            })
            .collect(),
        created_at: chat.created_at,
        updated_at: chat.updated_at,
    }
}
