//! In-memory port implementations for service tests.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use huddle_types::chat::{Chat, ChatId, NewMessage, member_key};
use huddle_types::error::RepositoryError;
use huddle_types::media::ImageRef;
use huddle_types::user::{DEFAULT_STATUS, ProfileSummary, User, UserId};
use tempfile::NamedTempFile;

use crate::repository::chat::{ChatRepository, GroupPatch, Removal};
use crate::repository::token::{AuthToken, TokenRepository};
use crate::repository::user::UserRepository;
use crate::service::credentials::Credentials;
use crate::storage::object_store::ObjectStore;
use crate::storage::staged::StagedImage;

pub fn staged_image(size: usize) -> StagedImage {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&vec![0u8; size]).unwrap();
    StagedImage::from_temp_file(
        file,
        size as u64,
        Some("photo.png".to_string()),
        Some("image/png".to_string()),
    )
}

pub fn user(name: &str) -> User {
    let now = Utc::now();
    User {
        id: UserId::new(),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        username: name.to_lowercase(),
        password_hash: "hashed:secret1".to_string(),
        status: DEFAULT_STATUS.to_string(),
        photo: ImageRef::placeholder("https://example.com/avatar.png"),
        created_at: now,
        updated_at: now,
    }
}

// --- Users ---

#[derive(Clone, Default)]
pub struct MemoryUserRepository {
    users: Arc<Mutex<Vec<User>>>,
}

impl MemoryUserRepository {
    pub fn with_users(users: &[User]) -> Self {
        Self {
            users: Arc::new(Mutex::new(users.to_vec())),
        }
    }

    pub fn get(&self, id: &UserId) -> Option<User> {
        self.users.lock().unwrap().iter().find(|u| u.id == *id).cloned()
    }
}

impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: &User) -> Result<User, RepositoryError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict("email".to_string()));
        }
        if users.iter().any(|u| u.username == user.username) {
            return Err(RepositoryError::Conflict("username".to_string()));
        }
        users.push(user.clone());
        Ok(user.clone())
    }

    async fn get_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.get(id))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let email = email.to_lowercase();
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn search(&self, text: Option<&str>) -> Result<Vec<User>, RepositoryError> {
        let needle = text.map(str::to_lowercase);
        let mut found: Vec<User> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| match &needle {
                Some(n) => {
                    u.name.to_lowercase().contains(n) || u.username.to_lowercase().contains(n)
                }
                None => true,
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn update(&self, user: &User) -> Result<User, RepositoryError> {
        let mut users = self.users.lock().unwrap();
        if users
            .iter()
            .any(|u| u.id != user.id && u.username == user.username)
        {
            return Err(RepositoryError::Conflict("username".to_string()));
        }
        let slot = users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = user.clone();
        Ok(user.clone())
    }

    async fn summaries(&self, ids: &[UserId]) -> Result<Vec<ProfileSummary>, RepositoryError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| ids.contains(&u.id))
            .map(User::summary)
            .collect())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.users.lock().unwrap().len() as u64)
    }
}

// --- Chats ---

#[derive(Clone, Default)]
pub struct MemoryChatRepository {
    chats: Arc<Mutex<HashMap<ChatId, Chat>>>,
    leave_after_get: Arc<Mutex<Option<UserId>>>,
}

impl MemoryChatRepository {
    pub fn snapshot(&self, id: &ChatId) -> Option<Chat> {
        self.chats.lock().unwrap().get(id).cloned()
    }

    /// Have `user` leave the chat read by the next `get`, after that read
    /// returns, as a concurrent request would.
    pub fn leave_after_next_get(&self, user: UserId) {
        *self.leave_after_get.lock().unwrap() = Some(user);
    }

    pub fn len(&self) -> usize {
        self.chats.lock().unwrap().len()
    }

    fn mutate<F>(&self, id: &ChatId, f: F) -> Result<Chat, RepositoryError>
    where
        F: FnOnce(&mut Chat) -> Result<(), RepositoryError>,
    {
        let mut chats = self.chats.lock().unwrap();
        let chat = chats.get_mut(id).ok_or(RepositoryError::NotFound)?;
        f(chat)?;
        chat.updated_at = Utc::now();
        Ok(chat.clone())
    }
}

fn new_chat(is_group: bool, members: Vec<UserId>, now: DateTime<Utc>) -> Chat {
    Chat {
        id: ChatId::new(),
        is_group,
        members,
        group_name: None,
        group_photo: None,
        group_admin: None,
        messages: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

fn ensure_admin(chat: &Chat, admin: &UserId) -> Result<(), RepositoryError> {
    if chat.group_admin == Some(*admin) {
        Ok(())
    } else {
        Err(RepositoryError::Precondition("admin changed".to_string()))
    }
}

impl ChatRepository for MemoryChatRepository {
    async fn get(&self, id: &ChatId) -> Result<Option<Chat>, RepositoryError> {
        let chat = self.snapshot(id);
        let leaver = self.leave_after_get.lock().unwrap().take();
        if let Some(leaver) = leaver {
            self.remove_member(id, &leaver, Removal::Leave).await?;
        }
        Ok(chat)
    }

    async fn find_group_by_members(
        &self,
        members: &[UserId],
    ) -> Result<Option<Chat>, RepositoryError> {
        let key = member_key(members);
        Ok(self
            .chats
            .lock()
            .unwrap()
            .values()
            .find(|c| c.is_group && member_key(&c.members) == key)
            .cloned())
    }

    async fn append_direct_message(
        &self,
        a: &UserId,
        b: &UserId,
        message: NewMessage,
    ) -> Result<Chat, RepositoryError> {
        let key = member_key(&[*a, *b]);
        let now = Utc::now();
        let mut chats = self.chats.lock().unwrap();
        let id = match chats
            .values()
            .find(|c| !c.is_group && member_key(&c.members) == key)
        {
            Some(chat) => chat.id,
            None => {
                let chat = new_chat(false, vec![*a, *b], now);
                let id = chat.id;
                chats.insert(id, chat);
                id
            }
        };
        let chat = chats.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        chat.messages.push(message.into_message(now));
        chat.updated_at = now;
        Ok(chat.clone())
    }

    async fn create_group(&self, group: &Chat) -> Result<Chat, RepositoryError> {
        let key = member_key(&group.members);
        let mut chats = self.chats.lock().unwrap();
        if chats
            .values()
            .any(|c| c.is_group && member_key(&c.members) == key)
        {
            return Err(RepositoryError::Conflict("group members".to_string()));
        }
        chats.insert(group.id, group.clone());
        Ok(group.clone())
    }

    async fn append_message(
        &self,
        id: &ChatId,
        message: NewMessage,
    ) -> Result<Chat, RepositoryError> {
        self.mutate(id, |chat| {
            chat.messages.push(message.into_message(Utc::now()));
            Ok(())
        })
    }

    async fn add_member(
        &self,
        id: &ChatId,
        user: &UserId,
        admin: &UserId,
    ) -> Result<Chat, RepositoryError> {
        self.mutate(id, |chat| {
            ensure_admin(chat, admin)?;
            if chat.members.contains(user) {
                return Err(RepositoryError::Conflict("member".to_string()));
            }
            chat.members.push(*user);
            Ok(())
        })
    }

    async fn remove_member(
        &self,
        id: &ChatId,
        user: &UserId,
        removal: Removal,
    ) -> Result<Chat, RepositoryError> {
        self.mutate(id, |chat| {
            if let Removal::ByAdmin(admin) = removal {
                ensure_admin(chat, &admin)?;
                if admin == *user {
                    return Err(RepositoryError::Precondition("target is the admin".to_string()));
                }
            }
            if !chat.members.contains(user) {
                return Err(RepositoryError::NotFound);
            }
            chat.members.retain(|m| m != user);
            if chat.group_admin == Some(*user) {
                chat.group_admin = chat.members.first().copied();
            }
            Ok(())
        })
    }

    async fn update_group(
        &self,
        id: &ChatId,
        patch: GroupPatch,
        admin: &UserId,
    ) -> Result<Chat, RepositoryError> {
        self.mutate(id, |chat| {
            ensure_admin(chat, admin)?;
            if let Some(name) = patch.name {
                chat.group_name = Some(name);
            }
            if let Some(photo) = patch.photo {
                chat.group_photo = Some(photo);
            }
            Ok(())
        })
    }

    async fn list_for_user(&self, user: &UserId) -> Result<Vec<Chat>, RepositoryError> {
        let mut found: Vec<Chat> = self
            .chats
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.members.contains(user))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(found)
    }

    async fn count_chats(&self) -> Result<u64, RepositoryError> {
        Ok(self.len() as u64)
    }

    async fn count_messages(&self) -> Result<u64, RepositoryError> {
        Ok(self
            .chats
            .lock()
            .unwrap()
            .values()
            .map(|c| c.messages.len() as u64)
            .sum())
    }
}

// --- Tokens ---

#[derive(Clone, Default)]
pub struct MemoryTokenRepository {
    tokens: Arc<Mutex<Vec<AuthToken>>>,
}

impl MemoryTokenRepository {
    pub fn len(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }
}

impl TokenRepository for MemoryTokenRepository {
    async fn insert(&self, token: &AuthToken) -> Result<(), RepositoryError> {
        self.tokens.lock().unwrap().push(token.clone());
        Ok(())
    }

    async fn find_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, RepositoryError> {
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.token_hash == token_hash && t.expires_at > now)
            .map(|t| t.user_id))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut tokens = self.tokens.lock().unwrap();
        let before = tokens.len();
        tokens.retain(|t| t.expires_at > now);
        Ok((before - tokens.len()) as u64)
    }
}

// --- Object storage ---

/// Records every call; deletes can be made to fail.
#[derive(Clone, Default)]
pub struct RecordingObjectStore {
    uploads: Arc<AtomicU64>,
    deleted: Arc<Mutex<Vec<String>>>,
    fail_deletes: Arc<AtomicBool>,
    fail_uploads: Arc<AtomicBool>,
}

impl RecordingObjectStore {
    pub fn upload_count(&self) -> u64 {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }
}

impl ObjectStore for RecordingObjectStore {
    async fn upload(&self, image: &StagedImage) -> Result<ImageRef, RepositoryError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("upload refused".to_string()));
        }
        assert!(image.path().exists(), "staged file must exist during upload");
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        let file = format!("object-{n}.{}", image.extension());
        Ok(ImageRef::new(format!("https://cdn.test/media/{file}"), file))
    }

    async fn delete(&self, delete_ref: &str) -> Result<(), RepositoryError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("delete refused".to_string()));
        }
        self.deleted.lock().unwrap().push(delete_ref.to_string());
        Ok(())
    }
}

// --- Credentials ---

/// Transparent, deterministic credentials.
#[derive(Default)]
pub struct FakeCredentials {
    issued: AtomicU64,
}

impl Credentials for FakeCredentials {
    fn hash_password(&self, password: &str) -> Result<String, String> {
        Ok(format!("hashed:{password}"))
    }

    fn verify_password(&self, password: &str, stored_hash: &str) -> bool {
        stored_hash == format!("hashed:{password}")
    }

    fn generate_token(&self) -> String {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        format!("hdl_test{n}")
    }

    fn token_digest(&self, token: &str) -> String {
        format!("digest:{token}")
    }
}
