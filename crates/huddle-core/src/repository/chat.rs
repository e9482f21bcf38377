//! ChatRepository trait definition.
//!
//! Every mutating method is a single atomic unit in the store and returns the
//! post-update chat, so callers never write back state they read earlier.

use huddle_types::chat::{Chat, ChatId, NewMessage};
use huddle_types::error::RepositoryError;
use huddle_types::media::ImageRef;
use huddle_types::user::UserId;

/// Who takes a member out of a group. Checked against the stored group
/// inside the same transaction as the delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The given admin removes someone else. Fails with
    /// `RepositoryError::Precondition` if they no longer hold the role or
    /// the target does.
    ByAdmin(UserId),
    /// The member leaves. If they hold the admin role at that point it
    /// passes to the earliest-joined remaining member, or is cleared when
    /// nobody is left.
    Leave,
}

/// Group fields an admin may replace. `None` means "leave as is".
#[derive(Debug, Clone, Default)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub photo: Option<ImageRef>,
}

/// Repository trait for chat, membership and message persistence.
///
/// Implementations live in huddle-infra (e.g., `SqliteChatRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ChatRepository: Send + Sync {
    /// Fetch a chat with its members (join order) and messages (append order).
    fn get(
        &self,
        id: &ChatId,
    ) -> impl std::future::Future<Output = Result<Option<Chat>, RepositoryError>> + Send;

    /// A group whose member set equals `members`, ignoring order.
    fn find_group_by_members(
        &self,
        members: &[UserId],
    ) -> impl std::future::Future<Output = Result<Option<Chat>, RepositoryError>> + Send;

    /// Append to the direct chat between `a` and `b`, creating it first if
    /// absent. Concurrent first messages between one pair land in one chat.
    fn append_direct_message(
        &self,
        a: &UserId,
        b: &UserId,
        message: NewMessage,
    ) -> impl std::future::Future<Output = Result<Chat, RepositoryError>> + Send;

    /// Insert a new group.
    ///
    /// Fails with `RepositoryError::Conflict` if a group with the same member
    /// set already exists; the check and the insert are one transaction.
    fn create_group(
        &self,
        group: &Chat,
    ) -> impl std::future::Future<Output = Result<Chat, RepositoryError>> + Send;

    /// Append one message to an existing chat.
    fn append_message(
        &self,
        id: &ChatId,
        message: NewMessage,
    ) -> impl std::future::Future<Output = Result<Chat, RepositoryError>> + Send;

    /// Add `user` at the end of the member list on behalf of `admin`.
    ///
    /// Fails with `RepositoryError::Precondition` if `admin` is not the
    /// stored admin, and with `RepositoryError::Conflict` if `user` is
    /// already a member.
    fn add_member(
        &self,
        id: &ChatId,
        user: &UserId,
        admin: &UserId,
    ) -> impl std::future::Future<Output = Result<Chat, RepositoryError>> + Send;

    /// Remove `user` from the member list.
    ///
    /// Fails with `RepositoryError::NotFound` if `user` was not a member.
    fn remove_member(
        &self,
        id: &ChatId,
        user: &UserId,
        removal: Removal,
    ) -> impl std::future::Future<Output = Result<Chat, RepositoryError>> + Send;

    /// Replace group name and/or photo on behalf of `admin`.
    ///
    /// Fails with `RepositoryError::Precondition` if `admin` is not the
    /// stored admin.
    fn update_group(
        &self,
        id: &ChatId,
        patch: GroupPatch,
        admin: &UserId,
    ) -> impl std::future::Future<Output = Result<Chat, RepositoryError>> + Send;

    /// Every chat `user` belongs to, most recently updated first.
    fn list_for_user(
        &self,
        user: &UserId,
    ) -> impl std::future::Future<Output = Result<Vec<Chat>, RepositoryError>> + Send;

    fn count_chats(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    fn count_messages(
        &self,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
