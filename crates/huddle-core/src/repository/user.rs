//! User repository trait definition.

use huddle_types::error::RepositoryError;
use huddle_types::user::{ProfileSummary, User, UserId};

/// Repository trait for user persistence and directory lookups.
///
/// Implementations live in huddle-infra (e.g., SqliteUserRepository).
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait UserRepository: Send + Sync {
    /// Insert a new user.
    ///
    /// Fails with `RepositoryError::Conflict` naming the offending column
    /// ("email" or "username") when a unique constraint is hit.
    fn create(
        &self,
        user: &User,
    ) -> impl std::future::Future<Output = Result<User, RepositoryError>> + Send;

    fn get_by_id(
        &self,
        id: &UserId,
    ) -> impl std::future::Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// Lookup by email (case-insensitive).
    fn get_by_email(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Result<Option<User>, RepositoryError>> + Send;

    fn get_by_username(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// Case-insensitive substring match on name or username, ordered by name.
    /// `None` lists every user.
    fn search(
        &self,
        text: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Vec<User>, RepositoryError>> + Send;

    /// Overwrite the mutable profile fields. Returns the stored user.
    fn update(
        &self,
        user: &User,
    ) -> impl std::future::Future<Output = Result<User, RepositoryError>> + Send;

    /// Project id/name/photo for each id that exists. Unknown ids are skipped.
    fn summaries(
        &self,
        ids: &[UserId],
    ) -> impl std::future::Future<Output = Result<Vec<ProfileSummary>, RepositoryError>> + Send;

    fn count(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
