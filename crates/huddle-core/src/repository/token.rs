//! Bearer token persistence.
//!
//! Only a digest of each token is stored; the plaintext is shown to the
//! client once, at issuance.

use chrono::{DateTime, Utc};
use huddle_types::error::RepositoryError;
use huddle_types::user::UserId;
use uuid::Uuid;

/// A stored token record.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub id: Uuid,
    pub user_id: UserId,
    /// Lowercase hex SHA-256 of the plaintext token.
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub trait TokenRepository: Send + Sync {
    fn insert(
        &self,
        token: &AuthToken,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Owner of an unexpired token with this digest.
    fn find_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Option<UserId>, RepositoryError>> + Send;

    /// Drop every token that expired before `now`. Returns how many went.
    fn purge_expired(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
