//! SQLite user repository implementation.
//!
//! Implements `UserRepository` from `huddle-core` using sqlx with split read/write pools.

use huddle_core::repository::user::UserRepository;
use huddle_types::error::RepositoryError;
use huddle_types::media::ImageRef;
use huddle_types::user::{ProfileSummary, User, UserId};
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, is_unique_violation, parse_datetime, query_error};

/// SQLite-backed implementation of `UserRepository`.
#[derive(Clone)]
pub struct SqliteUserRepository {
    pool: DatabasePool,
}

impl SqliteUserRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain User.
struct UserRow {
    id: String,
    name: String,
    email: String,
    username: String,
    password_hash: String,
    status: String,
    photo_url: String,
    photo_delete_ref: Option<String>,
    created_at: String,
    updated_at: String,
}

impl UserRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            status: row.try_get("status")?,
            photo_url: row.try_get("photo_url")?,
            photo_delete_ref: row.try_get("photo_delete_ref")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_user(self) -> Result<User, RepositoryError> {
        let id = self
            .id
            .parse::<UserId>()
            .map_err(|e| RepositoryError::Query(format!("invalid user id: {e}")))?;

        Ok(User {
            id,
            name: self.name,
            email: self.email,
            username: self.username,
            password_hash: self.password_hash,
            status: self.status,
            photo: ImageRef {
                url: self.photo_url,
                delete_ref: self.photo_delete_ref,
            },
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn map_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, RepositoryError> {
    UserRow::from_row(row).map_err(query_error)?.into_user()
}

/// Which unique column a constraint error names.
fn conflict_column(e: &sqlx::Error) -> String {
    match e {
        sqlx::Error::Database(db_err) if db_err.message().contains("users.email") => {
            "email".to_string()
        }
        _ => "username".to_string(),
    }
}

/// Escape LIKE wildcards so user text matches literally.
fn like_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: &User) -> Result<User, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO users (id, name, email, username, password_hash, status, photo_url, photo_delete_ref, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(user.email.to_lowercase())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.status)
        .bind(&user.photo.url)
        .bind(&user.photo.delete_ref)
        .bind(format_datetime(&user.created_at))
        .bind(format_datetime(&user.updated_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(user.clone()),
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::Conflict(conflict_column(&e))),
            Err(e) => Err(query_error(e)),
        }
    }

    async fn get_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        row.as_ref().map(map_user).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        row.as_ref().map(map_user).transpose()
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        row.as_ref().map(map_user).transpose()
    }

    async fn search(&self, text: Option<&str>) -> Result<Vec<User>, RepositoryError> {
        let rows = match text {
            Some(text) => {
                let pattern = like_pattern(text);
                sqlx::query(
                    "SELECT * FROM users
                     WHERE name LIKE ? ESCAPE '\\' OR username LIKE ? ESCAPE '\\'
                     ORDER BY name COLLATE NOCASE, id",
                )
                .bind(&pattern)
                .bind(&pattern)
                .fetch_all(&self.pool.reader)
                .await
            }
            None => {
                sqlx::query("SELECT * FROM users ORDER BY name COLLATE NOCASE, id")
                    .fetch_all(&self.pool.reader)
                    .await
            }
        }
        .map_err(query_error)?;

        rows.iter().map(map_user).collect()
    }

    async fn update(&self, user: &User) -> Result<User, RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET name = ?, username = ?, status = ?, photo_url = ?, photo_delete_ref = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&user.name)
        .bind(&user.username)
        .bind(&user.status)
        .bind(&user.photo.url)
        .bind(&user.photo.delete_ref)
        .bind(format_datetime(&user.updated_at))
        .bind(user.id.to_string())
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(RepositoryError::NotFound),
            Ok(_) => Ok(user.clone()),
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::Conflict(conflict_column(&e))),
            Err(e) => Err(query_error(e)),
        }
    }

    async fn summaries(&self, ids: &[UserId]) -> Result<Vec<ProfileSummary>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT id, name, photo_url FROM users WHERE id IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.to_string());
        }
        let rows = query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(query_error)?;
                Ok(ProfileSummary {
                    id: id
                        .parse()
                        .map_err(|e| RepositoryError::Query(format!("invalid user id: {e}")))?,
                    name: row.try_get("name").map_err(query_error)?,
                    photo: row.try_get("photo_url").map_err(query_error)?,
                })
            })
            .collect()
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_error)?;
        Ok(count as u64)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sqlite::test_pool;
    use chrono::Utc;
    use huddle_types::user::DEFAULT_STATUS;

    pub(crate) fn make_user(name: &str) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            username: name.to_lowercase(),
            password_hash: "$argon2id$stub".to_string(),
            status: DEFAULT_STATUS.to_string(),
            photo: ImageRef::placeholder("https://example.com/avatar.png"),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = SqliteUserRepository::new(test_pool().await);
        let ada = make_user("Ada");
        repo.create(&ada).await.unwrap();

        let by_id = repo.get_by_id(&ada.id).await.unwrap().unwrap();
        assert_eq!(by_id.name, "Ada");
        assert_eq!(by_id.photo, ada.photo);

        let by_email = repo.get_by_email("ADA@example.com").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(ada.id));

        assert!(repo.get_by_username("ada").await.unwrap().is_some());
        assert!(repo.get_by_id(&UserId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_email_and_username() {
        let repo = SqliteUserRepository::new(test_pool().await);
        repo.create(&make_user("Ada")).await.unwrap();

        let mut same_email = make_user("Bob");
        same_email.email = "ada@example.com".to_string();
        match repo.create(&same_email).await {
            Err(RepositoryError::Conflict(column)) => assert_eq!(column, "email"),
            other => panic!("expected email conflict, got {other:?}"),
        }

        let mut same_username = make_user("Bob");
        same_username.username = "ada".to_string();
        match repo.create(&same_username).await {
            Err(RepositoryError::Conflict(column)) => assert_eq!(column, "username"),
            other => panic!("expected username conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_literal() {
        let repo = SqliteUserRepository::new(test_pool().await);
        for name in ["Ada", "Bob", "Bea", "Dora"] {
            repo.create(&make_user(name)).await.unwrap();
        }

        let found = repo.search(Some("b")).await.unwrap();
        let names: Vec<&str> = found.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Bea", "Bob"]);

        assert!(repo.search(Some("%")).await.unwrap().is_empty());
        assert_eq!(repo.search(None).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_update_profile_fields() {
        let repo = SqliteUserRepository::new(test_pool().await);
        let mut ada = make_user("Ada");
        repo.create(&ada).await.unwrap();
        repo.create(&make_user("Bob")).await.unwrap();

        ada.status = "Busy".to_string();
        ada.photo = ImageRef::new("https://cdn.test/media/a.png", "a.png");
        repo.update(&ada).await.unwrap();
        let stored = repo.get_by_id(&ada.id).await.unwrap().unwrap();
        assert_eq!(stored.status, "Busy");
        assert_eq!(stored.photo.delete_ref.as_deref(), Some("a.png"));

        ada.username = "bob".to_string();
        assert!(matches!(
            repo.update(&ada).await,
            Err(RepositoryError::Conflict(_))
        ));

        let ghost = make_user("Ghost");
        assert!(matches!(
            repo.update(&ghost).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_summaries_skip_unknown_ids() {
        let repo = SqliteUserRepository::new(test_pool().await);
        let ada = make_user("Ada");
        repo.create(&ada).await.unwrap();

        let summaries = repo.summaries(&[ada.id, UserId::new()]).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "Ada");
        assert_eq!(summaries[0].photo, "https://example.com/avatar.png");
        assert!(repo.summaries(&[]).await.unwrap().is_empty());
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
