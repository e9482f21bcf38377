//! SQLite chat repository implementation.
//!
//! A chat is spread over three tables: `chats` (one row, including the
//! canonical `member_key`), `chat_members` (join order in `position`) and
//! `messages` (append order in `seq`). Every mutation is a single transaction
//! on the writer connection and re-reads the chat before committing, so the
//! returned value is exactly what was committed.

use chrono::Utc;
use huddle_core::repository::chat::{ChatRepository, GroupPatch, Removal};
use huddle_types::chat::{Chat, ChatId, Message, NewMessage, member_key};
use huddle_types::error::RepositoryError;
use huddle_types::media::ImageRef;
use huddle_types::user::UserId;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, is_unique_violation, parse_datetime, query_error};

/// SQLite-backed implementation of `ChatRepository`.
#[derive(Clone)]
pub struct SqliteChatRepository {
    pool: DatabasePool,
}

impl SqliteChatRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct ChatRow {
    id: String,
    is_group: bool,
    group_name: Option<String>,
    group_photo_url: Option<String>,
    group_photo_delete_ref: Option<String>,
    group_admin: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ChatRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            is_group: row.try_get("is_group")?,
            group_name: row.try_get("group_name")?,
            group_photo_url: row.try_get("group_photo_url")?,
            group_photo_delete_ref: row.try_get("group_photo_delete_ref")?,
            group_admin: row.try_get("group_admin")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_chat(
        self,
        members: Vec<UserId>,
        messages: Vec<Message>,
    ) -> Result<Chat, RepositoryError> {
        let id = self
            .id
            .parse::<ChatId>()
            .map_err(|e| RepositoryError::Query(format!("invalid chat id: {e}")))?;
        let group_admin = self.group_admin.as_deref().map(parse_user_id).transpose()?;
        let group_photo = self.group_photo_url.map(|url| ImageRef {
            url,
            delete_ref: self.group_photo_delete_ref,
        });

        Ok(Chat {
            id,
            is_group: self.is_group,
            members,
            group_name: self.group_name,
            group_photo,
            group_admin,
            messages,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct MessageRow {
    id: String,
    sender_id: String,
    text: Option<String>,
    image_url: Option<String>,
    image_delete_ref: Option<String>,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            sender_id: row.try_get("sender_id")?,
            text: row.try_get("text")?,
            image_url: row.try_get("image_url")?,
            image_delete_ref: row.try_get("image_delete_ref")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        Ok(Message {
            id,
            sender: parse_user_id(&self.sender_id)?,
            text: self.text,
            image: self.image_url.map(|url| ImageRef {
                url,
                delete_ref: self.image_delete_ref,
            }),
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

fn parse_user_id(s: &str) -> Result<UserId, RepositoryError> {
    s.parse()
        .map_err(|e| RepositoryError::Query(format!("invalid user id: {e}")))
}

// ---------------------------------------------------------------------------
// Connection-level helpers, shared by reads and by write transactions.
// ---------------------------------------------------------------------------

async fn load_members(
    conn: &mut SqliteConnection,
    chat_id: &str,
) -> Result<Vec<UserId>, RepositoryError> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT user_id FROM chat_members WHERE chat_id = ? ORDER BY position")
            .bind(chat_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(query_error)?;
    rows.iter().map(|(id,)| parse_user_id(id)).collect()
}

async fn load_chat(
    conn: &mut SqliteConnection,
    chat_id: &str,
) -> Result<Option<Chat>, RepositoryError> {
    let row = sqlx::query("SELECT * FROM chats WHERE id = ?")
        .bind(chat_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(query_error)?;
    let Some(row) = row else {
        return Ok(None);
    };
    let chat_row = ChatRow::from_row(&row).map_err(query_error)?;

    let members = load_members(conn, chat_id).await?;
    let message_rows = sqlx::query("SELECT * FROM messages WHERE chat_id = ? ORDER BY seq")
        .bind(chat_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(query_error)?;
    let messages = message_rows
        .iter()
        .map(|row| MessageRow::from_row(row).map_err(query_error)?.into_message())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(chat_row.into_chat(members, messages)?))
}

/// Load a chat that must exist (used right before commit).
async fn reload(conn: &mut SqliteConnection, chat_id: &str) -> Result<Chat, RepositoryError> {
    load_chat(conn, chat_id).await?.ok_or(RepositoryError::NotFound)
}

async fn find_by_key(
    conn: &mut SqliteConnection,
    is_group: bool,
    key: &str,
) -> Result<Option<String>, RepositoryError> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT id FROM chats WHERE is_group = ? AND member_key = ? LIMIT 1")
            .bind(is_group)
            .bind(key)
            .fetch_optional(&mut *conn)
            .await
            .map_err(query_error)?;
    Ok(row.map(|(id,)| id))
}

/// Bump `updated_at`; `NotFound` if the chat does not exist.
async fn touch(conn: &mut SqliteConnection, chat_id: &str) -> Result<(), RepositoryError> {
    let result = sqlx::query("UPDATE chats SET updated_at = ? WHERE id = ?")
        .bind(format_datetime(&Utc::now()))
        .bind(chat_id)
        .execute(&mut *conn)
        .await
        .map_err(query_error)?;
    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

async fn insert_message(
    conn: &mut SqliteConnection,
    chat_id: &str,
    message: NewMessage,
) -> Result<(), RepositoryError> {
    let message = message.into_message(Utc::now());
    let (seq,): (i64,) =
        sqlx::query_as("SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_one(&mut *conn)
            .await
            .map_err(query_error)?;

    sqlx::query(
        "INSERT INTO messages (id, chat_id, seq, sender_id, text, image_url, image_delete_ref, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(message.id.to_string())
    .bind(chat_id)
    .bind(seq)
    .bind(message.sender.to_string())
    .bind(&message.text)
    .bind(message.image.as_ref().map(|i| i.url.clone()))
    .bind(message.image.as_ref().and_then(|i| i.delete_ref.clone()))
    .bind(format_datetime(&message.created_at))
    .execute(&mut *conn)
    .await
    .map_err(query_error)?;
    Ok(())
}

async fn insert_member(
    conn: &mut SqliteConnection,
    chat_id: &str,
    user: &UserId,
    position: i64,
) -> Result<(), RepositoryError> {
    sqlx::query("INSERT INTO chat_members (chat_id, user_id, position) VALUES (?, ?, ?)")
        .bind(chat_id)
        .bind(user.to_string())
        .bind(position)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Conflict(format!("user {user} is already a member"))
            } else {
                query_error(e)
            }
        })?;
    Ok(())
}

/// Recompute `member_key` after a membership change.
async fn refresh_member_key(
    conn: &mut SqliteConnection,
    chat_id: &str,
) -> Result<(), RepositoryError> {
    let members = load_members(conn, chat_id).await?;
    sqlx::query("UPDATE chats SET member_key = ? WHERE id = ?")
        .bind(member_key(&members))
        .bind(chat_id)
        .execute(&mut *conn)
        .await
        .map_err(query_error)?;
    Ok(())
}

/// The stored admin of a chat; `NotFound` if the chat does not exist.
async fn stored_admin(
    conn: &mut SqliteConnection,
    chat_id: &str,
) -> Result<Option<String>, RepositoryError> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT group_admin FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(query_error)?;
    row.map(|(admin,)| admin).ok_or(RepositoryError::NotFound)
}

/// `Precondition` unless `admin` is the stored admin of the chat.
async fn ensure_admin(
    conn: &mut SqliteConnection,
    chat_id: &str,
    admin: &UserId,
) -> Result<(), RepositoryError> {
    match stored_admin(conn, chat_id).await? {
        Some(current) if current == admin.to_string() => Ok(()),
        _ => Err(RepositoryError::Precondition(format!(
            "{admin} is not the admin of chat {chat_id}"
        ))),
    }
}

impl ChatRepository for SqliteChatRepository {
    async fn get(&self, id: &ChatId) -> Result<Option<Chat>, RepositoryError> {
        let mut tx = self.pool.reader.begin().await.map_err(query_error)?;
        let chat = load_chat(&mut tx, &id.to_string()).await?;
        tx.commit().await.map_err(query_error)?;
        Ok(chat)
    }

    async fn find_group_by_members(
        &self,
        members: &[UserId],
    ) -> Result<Option<Chat>, RepositoryError> {
        let mut tx = self.pool.reader.begin().await.map_err(query_error)?;
        let chat = match find_by_key(&mut tx, true, &member_key(members)).await? {
            Some(id) => load_chat(&mut tx, &id).await?,
            None => None,
        };
        tx.commit().await.map_err(query_error)?;
        Ok(chat)
    }

    async fn append_direct_message(
        &self,
        a: &UserId,
        b: &UserId,
        message: NewMessage,
    ) -> Result<Chat, RepositoryError> {
        let key = member_key(&[*a, *b]);
        let now = format_datetime(&Utc::now());
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        // The partial unique index makes this a no-op when the pair already
        // has a chat, including one created by a concurrent request.
        let candidate = ChatId::new().to_string();
        let inserted = sqlx::query(
            "INSERT INTO chats (id, is_group, member_key, created_at, updated_at)
             VALUES (?, 0, ?, ?, ?)
             ON CONFLICT(member_key) WHERE is_group = 0 DO NOTHING",
        )
        .bind(&candidate)
        .bind(&key)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(query_error)?
        .rows_affected()
            == 1;
        if inserted {
            insert_member(&mut tx, &candidate, a, 0).await?;
            insert_member(&mut tx, &candidate, b, 1).await?;
        }

        let chat_id = find_by_key(&mut tx, false, &key)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        insert_message(&mut tx, &chat_id, message).await?;
        touch(&mut tx, &chat_id).await?;
        let chat = reload(&mut tx, &chat_id).await?;

        tx.commit().await.map_err(query_error)?;
        Ok(chat)
    }

    async fn create_group(&self, group: &Chat) -> Result<Chat, RepositoryError> {
        let key = member_key(&group.members);
        let chat_id = group.id.to_string();
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        if find_by_key(&mut tx, true, &key).await?.is_some() {
            return Err(RepositoryError::Conflict(
                "a group with these members already exists".to_string(),
            ));
        }

        sqlx::query(
            "INSERT INTO chats (id, is_group, member_key, group_name, group_photo_url, group_photo_delete_ref, group_admin, created_at, updated_at)
             VALUES (?, 1, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&chat_id)
        .bind(&key)
        .bind(&group.group_name)
        .bind(group.group_photo.as_ref().map(|p| p.url.clone()))
        .bind(group.group_photo.as_ref().and_then(|p| p.delete_ref.clone()))
        .bind(group.group_admin.map(|a| a.to_string()))
        .bind(format_datetime(&group.created_at))
        .bind(format_datetime(&group.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(query_error)?;

        for (position, member) in group.members.iter().enumerate() {
            insert_member(&mut tx, &chat_id, member, position as i64).await?;
        }
        let chat = reload(&mut tx, &chat_id).await?;

        tx.commit().await.map_err(query_error)?;
        Ok(chat)
    }

    async fn append_message(
        &self,
        id: &ChatId,
        message: NewMessage,
    ) -> Result<Chat, RepositoryError> {
        let chat_id = id.to_string();
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        touch(&mut tx, &chat_id).await?;
        insert_message(&mut tx, &chat_id, message).await?;
        let chat = reload(&mut tx, &chat_id).await?;

        tx.commit().await.map_err(query_error)?;
        Ok(chat)
    }

    async fn add_member(
        &self,
        id: &ChatId,
        user: &UserId,
        admin: &UserId,
    ) -> Result<Chat, RepositoryError> {
        let chat_id = id.to_string();
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        ensure_admin(&mut tx, &chat_id, admin).await?;
        let (position,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM chat_members WHERE chat_id = ?",
        )
        .bind(&chat_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(query_error)?;
        insert_member(&mut tx, &chat_id, user, position).await?;
        refresh_member_key(&mut tx, &chat_id).await?;
        touch(&mut tx, &chat_id).await?;
        let chat = reload(&mut tx, &chat_id).await?;

        tx.commit().await.map_err(query_error)?;
        Ok(chat)
    }

    async fn remove_member(
        &self,
        id: &ChatId,
        user: &UserId,
        removal: Removal,
    ) -> Result<Chat, RepositoryError> {
        let chat_id = id.to_string();
        let target = user.to_string();
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        let admin = stored_admin(&mut tx, &chat_id).await?;
        if let Removal::ByAdmin(expected) = removal {
            if admin != Some(expected.to_string()) || expected == *user {
                return Err(RepositoryError::Precondition(format!(
                    "{expected} cannot remove {user} from chat {chat_id}"
                )));
            }
        }
        let removed = sqlx::query("DELETE FROM chat_members WHERE chat_id = ? AND user_id = ?")
            .bind(&chat_id)
            .bind(&target)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
        if removed.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        if admin.as_deref() == Some(target.as_str()) {
            sqlx::query(
                "UPDATE chats SET group_admin =
                    (SELECT user_id FROM chat_members WHERE chat_id = ? ORDER BY position LIMIT 1)
                 WHERE id = ?",
            )
            .bind(&chat_id)
            .bind(&chat_id)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
        }
        refresh_member_key(&mut tx, &chat_id).await?;
        touch(&mut tx, &chat_id).await?;
        let chat = reload(&mut tx, &chat_id).await?;

        tx.commit().await.map_err(query_error)?;
        Ok(chat)
    }

    async fn update_group(
        &self,
        id: &ChatId,
        patch: GroupPatch,
        admin: &UserId,
    ) -> Result<Chat, RepositoryError> {
        let chat_id = id.to_string();
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        ensure_admin(&mut tx, &chat_id, admin).await?;
        touch(&mut tx, &chat_id).await?;
        if let Some(name) = &patch.name {
            sqlx::query("UPDATE chats SET group_name = ? WHERE id = ?")
                .bind(name)
                .bind(&chat_id)
                .execute(&mut *tx)
                .await
                .map_err(query_error)?;
        }
        if let Some(photo) = &patch.photo {
            sqlx::query(
                "UPDATE chats SET group_photo_url = ?, group_photo_delete_ref = ? WHERE id = ?",
            )
            .bind(&photo.url)
            .bind(&photo.delete_ref)
            .bind(&chat_id)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
        }
        let chat = reload(&mut tx, &chat_id).await?;

        tx.commit().await.map_err(query_error)?;
        Ok(chat)
    }

    async fn list_for_user(&self, user: &UserId) -> Result<Vec<Chat>, RepositoryError> {
        let mut tx = self.pool.reader.begin().await.map_err(query_error)?;
        let ids: Vec<(String,)> = sqlx::query_as(
            "SELECT c.id FROM chats c
             JOIN chat_members m ON m.chat_id = c.id
             WHERE m.user_id = ?
             ORDER BY c.updated_at DESC, c.id DESC",
        )
        .bind(user.to_string())
        .fetch_all(&mut *tx)
        .await
        .map_err(query_error)?;

        let mut chats = Vec::with_capacity(ids.len());
        for (id,) in &ids {
            if let Some(chat) = load_chat(&mut tx, id).await? {
                chats.push(chat);
            }
        }
        tx.commit().await.map_err(query_error)?;
        Ok(chats)
    }

    async fn count_chats(&self) -> Result<u64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chats")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_error)?;
        Ok(count as u64)
    }

    async fn count_messages(&self) -> Result<u64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_error)?;
        Ok(count as u64)
    }
}
