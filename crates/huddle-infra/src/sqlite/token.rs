//! SQLite bearer-token repository.

use chrono::{DateTime, Utc};
use huddle_core::repository::token::{AuthToken, TokenRepository};
use huddle_types::error::RepositoryError;
use huddle_types::user::UserId;

use super::pool::DatabasePool;
use super::{format_datetime, query_error};

#[derive(Clone)]
pub struct SqliteTokenRepository {
    pool: DatabasePool,
}

impl SqliteTokenRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl TokenRepository for SqliteTokenRepository {
    async fn insert(&self, token: &AuthToken) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO auth_tokens (id, user_id, token_hash, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(token.id.to_string())
        .bind(token.user_id.to_string())
        .bind(&token.token_hash)
        .bind(format_datetime(&token.created_at))
        .bind(format_datetime(&token.expires_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn find_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, RepositoryError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT user_id FROM auth_tokens WHERE token_hash = ? AND expires_at > ?")
                .bind(token_hash)
                .bind(format_datetime(&now))
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(query_error)?;

        row.map(|(id,)| {
            id.parse::<UserId>()
                .map_err(|e| RepositoryError::Query(format!("invalid user id: {e}")))
        })
        .transpose()
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= ?")
            .bind(format_datetime(&now))
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(result.rows_affected())
    }
}
