//! Account service: registration, login, token authentication and profiles.
//!
//! Backs the user directory and identity gate the conversation manager
//! relies on. Passwords and tokens go through the [`Credentials`] port; only
//! token digests are persisted.

use chrono::{Duration, Utc};
use huddle_types::error::{AccountError, RepositoryError};
use huddle_types::media::ImageRef;
use huddle_types::user::{
    DEFAULT_STATUS, DirectoryEntry, LoginRequest, MAX_NAME_CHARS, MAX_STATUS_CHARS,
    RegisterRequest, RemoveProfilePhotoRequest, UpdateProfileRequest, User, UserId,
    is_valid_email, is_valid_password,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::repository::token::{AuthToken, TokenRepository};
use crate::repository::user::UserRepository;
use crate::service::credentials::Credentials;
use crate::service::media::MediaService;
use crate::storage::object_store::ObjectStore;
use crate::storage::staged::StagedImage;

const USER_NOT_FOUND: &str = "User not found.";

fn upstream(err: RepositoryError) -> AccountError {
    AccountError::Upstream(err.to_string())
}

fn conflict_to_taken(err: RepositoryError, username: &str) -> AccountError {
    match err {
        RepositoryError::Conflict(column) if column == "email" => AccountError::EmailTaken,
        RepositoryError::Conflict(_) => AccountError::UsernameTaken(username.to_string()),
        other => upstream(other),
    }
}

/// Trim and bound a profile field to `1..=max` characters.
fn bounded(value: &str, max: usize, message: &str) -> Result<String, AccountError> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > max {
        return Err(AccountError::Validation(message.to_string()));
    }
    Ok(trimmed.to_string())
}

fn valid_name(name: &str) -> Result<String, AccountError> {
    bounded(name, MAX_NAME_CHARS, "Name length should be 1-25 characters.")
}

fn valid_username(username: &str) -> Result<String, AccountError> {
    let username = bounded(
        username,
        MAX_NAME_CHARS,
        "Username length should be 1-25 characters.",
    )?;
    if username.contains(char::is_whitespace) {
        return Err(AccountError::Validation(
            "Username cannot contain spaces.".to_string(),
        ));
    }
    Ok(username)
}

pub struct AccountService<U: UserRepository, T: TokenRepository, O: ObjectStore, C: Credentials> {
    users: U,
    tokens: T,
    media: MediaService<O>,
    credentials: C,
    token_ttl: Duration,
    default_profile_photo: String,
}

impl<U: UserRepository, T: TokenRepository, O: ObjectStore, C: Credentials>
    AccountService<U, T, O, C>
{
    /// - `token_ttl`: lifetime of issued bearer tokens
    /// - `default_profile_photo`: placeholder URL for users without a photo
    pub fn new(
        users: U,
        tokens: T,
        media: MediaService<O>,
        credentials: C,
        token_ttl: Duration,
        default_profile_photo: impl Into<String>,
    ) -> Self {
        Self {
            users,
            tokens,
            media,
            credentials,
            token_ttl,
            default_profile_photo: default_profile_photo.into(),
        }
    }

    /// Create an account and return a bearer token for it.
    pub async fn register(
        &self,
        request: RegisterRequest,
        photo: Option<StagedImage>,
    ) -> Result<String, AccountError> {
        let name = valid_name(&request.name)?;
        let username = valid_username(&request.username)?;
        let email = request.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AccountError::Validation(
                "Please enter a valid email.".to_string(),
            ));
        }
        if !is_valid_password(&request.password) {
            return Err(AccountError::Validation(
                "Password must be 6-15 characters with at least one letter and one digit."
                    .to_string(),
            ));
        }

        if self.users.get_by_email(&email).await.map_err(upstream)?.is_some() {
            return Err(AccountError::EmailTaken);
        }
        if self
            .users
            .get_by_username(&username)
            .await
            .map_err(upstream)?
            .is_some()
        {
            return Err(AccountError::UsernameTaken(username));
        }

        let password_hash = self
            .credentials
            .hash_password(&request.password)
            .map_err(AccountError::Upstream)?;

        let photo = match self.media.store_optional(photo).await? {
            Some(stored) => stored,
            None => ImageRef::placeholder(self.default_profile_photo.clone()),
        };

        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            name,
            email,
            username,
            password_hash,
            status: DEFAULT_STATUS.to_string(),
            photo: photo.clone(),
            created_at: now,
            updated_at: now,
        };
        let user = match self.users.create(&user).await {
            Ok(user) => user,
            Err(e) => {
                self.media.discard(&photo).await;
                return Err(conflict_to_taken(e, &user.username));
            }
        };

        info!(user_id = %user.id, username = %user.username, "account registered");
        self.issue_token(&user.id).await
    }

    /// Exchange email and password for a new bearer token.
    pub async fn login(&self, request: LoginRequest) -> Result<String, AccountError> {
        let email = request.email.trim().to_lowercase();
        if email.is_empty() || request.password.is_empty() {
            return Err(AccountError::Validation(
                "Please enter correct details.".to_string(),
            ));
        }

        let user = self
            .users
            .get_by_email(&email)
            .await
            .map_err(upstream)?
            .ok_or(AccountError::InvalidCredentials)?;
        if !self
            .credentials
            .verify_password(&request.password, &user.password_hash)
        {
            debug!(user_id = %user.id, "password mismatch");
            return Err(AccountError::InvalidCredentials);
        }

        self.issue_token(&user.id).await
    }

    /// Resolve a bearer token to its user.
    pub async fn authenticate(&self, token: &str) -> Result<User, AccountError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AccountError::Unauthorized("No token provided.".to_string()));
        }

        let digest = self.credentials.token_digest(token);
        let user_id = self
            .tokens
            .find_user(&digest, Utc::now())
            .await
            .map_err(upstream)?
            .ok_or_else(|| AccountError::Unauthorized("Token is not valid.".to_string()))?;

        self.users
            .get_by_id(&user_id)
            .await
            .map_err(upstream)?
            .ok_or_else(|| AccountError::Unauthorized("Token is not valid.".to_string()))
    }

    pub async fn current_user(&self, id: &UserId) -> Result<User, AccountError> {
        self.users
            .get_by_id(id)
            .await
            .map_err(upstream)?
            .ok_or_else(|| AccountError::NotFound(USER_NOT_FOUND.to_string()))
    }

    /// Public profile by id.
    pub async fn get_user(&self, raw_id: &str) -> Result<User, AccountError> {
        let id: UserId = raw_id
            .parse()
            .map_err(|_| AccountError::NotFound(USER_NOT_FOUND.to_string()))?;
        self.current_user(&id).await
    }

    /// Directory search, never listing the actor.
    pub async fn search_users(
        &self,
        actor: &UserId,
        text: Option<&str>,
    ) -> Result<Vec<DirectoryEntry>, AccountError> {
        let text = text.map(str::trim).filter(|t| !t.is_empty());
        let found = self.users.search(text).await.map_err(upstream)?;
        Ok(found
            .iter()
            .filter(|u| u.id != *actor)
            .map(User::directory_entry)
            .collect())
    }

    /// Edit name, username, status and/or photo. Absent fields stay as they are.
    ///
    /// A replaced photo follows upload new, delete old, commit; if the old
    /// object cannot be deleted the new one is discarded and nothing changes.
    pub async fn update_profile(
        &self,
        actor: &UserId,
        request: UpdateProfileRequest,
        photo: Option<StagedImage>,
    ) -> Result<User, AccountError> {
        let mut user = self.current_user(actor).await?;

        if let Some(name) = &request.name {
            user.name = valid_name(name)?;
        }
        if let Some(username) = &request.username {
            let username = valid_username(username)?;
            if username != user.username {
                if let Some(owner) = self
                    .users
                    .get_by_username(&username)
                    .await
                    .map_err(upstream)?
                {
                    if owner.id != user.id {
                        return Err(AccountError::UsernameTaken(username));
                    }
                }
            }
            user.username = username;
        }
        if let Some(status) = &request.status {
            user.status = bounded(
                status,
                MAX_STATUS_CHARS,
                "Status length should be 1-100 characters.",
            )?;
        }

        let new_photo = self.media.store_optional(photo).await?;
        if let Some(fresh) = &new_photo {
            if let Err(e) = self.media.delete(&user.photo).await {
                warn!(user_id = %user.id, error = %e, "could not delete previous profile photo");
                self.media.discard(fresh).await;
                return Err(e.into());
            }
            user.photo = fresh.clone();
        }

        user.updated_at = Utc::now();
        match self.users.update(&user).await {
            Ok(user) => {
                info!(user_id = %user.id, "profile updated");
                Ok(user)
            }
            Err(e) => {
                if let Some(fresh) = &new_photo {
                    self.media.discard(fresh).await;
                }
                Err(conflict_to_taken(e, &user.username))
            }
        }
    }

    /// Reset the profile photo to the placeholder, deleting the stored object.
    pub async fn remove_profile_photo(
        &self,
        actor: &UserId,
        request: RemoveProfilePhotoRequest,
    ) -> Result<User, AccountError> {
        let mut user = self.current_user(actor).await?;
        if user.photo.is_placeholder() {
            return Ok(user);
        }

        let supplied = request.photo_ref.as_deref().map(str::trim);
        if supplied != user.photo.delete_ref.as_deref() {
            return Err(AccountError::Validation(
                "Photo reference does not match the profile photo.".to_string(),
            ));
        }
        self.media.delete(&user.photo).await?;

        user.photo = ImageRef::placeholder(self.default_profile_photo.clone());
        user.updated_at = Utc::now();
        let user = self.users.update(&user).await.map_err(upstream)?;
        info!(user_id = %user.id, "profile photo removed");
        Ok(user)
    }

    /// Drop expired tokens. Returns how many were removed.
    pub async fn purge_expired_tokens(&self) -> Result<u64, AccountError> {
        self.tokens.purge_expired(Utc::now()).await.map_err(upstream)
    }

    async fn issue_token(&self, user_id: &UserId) -> Result<String, AccountError> {
        let token = self.credentials.generate_token();
        let now = Utc::now();
        let record = AuthToken {
            id: Uuid::now_v7(),
            user_id: *user_id,
            token_hash: self.credentials.token_digest(&token),
            created_at: now,
            expires_at: now + self.token_ttl,
        };
        self.tokens.insert(&record).await.map_err(upstream)?;
        debug!(%user_id, expires_at = %record.expires_at, "token issued");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        FakeCredentials, MemoryTokenRepository, MemoryUserRepository, RecordingObjectStore,
        staged_image, user,
    };

    const AVATAR: &str = "https://example.com/avatar.png";

    type Service = AccountService<
        MemoryUserRepository,
        MemoryTokenRepository,
        RecordingObjectStore,
        FakeCredentials,
    >;

    fn service_with(users: MemoryUserRepository, tokens: MemoryTokenRepository, store: RecordingObjectStore) -> Service {
        AccountService::new(
            users,
            tokens,
            MediaService::new(store, 1024 * 1024),
            FakeCredentials::default(),
            Duration::days(7),
            AVATAR,
        )
    }

    fn service() -> (Service, MemoryUserRepository, RecordingObjectStore) {
        let users = MemoryUserRepository::default();
        let store = RecordingObjectStore::default();
        (
            service_with(users.clone(), MemoryTokenRepository::default(), store.clone()),
            users,
            store,
        )
    }

    fn registration(name: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.to_string(),
            email: format!("{}@Example.com", name.to_lowercase()),
            username: name.to_lowercase(),
            password: "secret1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let (service, _, _) = service();
        let token = service.register(registration("Ada"), None).await.unwrap();

        let user = service.authenticate(&token).await.unwrap();
        assert_eq!(user.name, "Ada");
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.status, DEFAULT_STATUS);
        assert_eq!(user.photo, ImageRef::placeholder(AVATAR));
        assert_eq!(user.password_hash, "hashed:secret1");
    }

    #[tokio::test]
    async fn test_register_rejects_taken_email_and_username() {
        let (service, _, _) = service();
        service.register(registration("Ada"), None).await.unwrap();

        let mut same_email = registration("Bob");
        same_email.email = "ADA@example.com".to_string();
        assert!(matches!(
            service.register(same_email, None).await,
            Err(AccountError::EmailTaken)
        ));

        let mut same_username = registration("Bob");
        same_username.username = "ada".to_string();
        assert!(matches!(
            service.register(same_username, None).await,
            Err(AccountError::UsernameTaken(u)) if u == "ada"
        ));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (service, users, _) = service();

        let mut weak = registration("Ada");
        weak.password = "abcdefg".to_string();
        assert!(matches!(service.register(weak, None).await, Err(AccountError::Validation(_))));

        let mut bad_email = registration("Ada");
        bad_email.email = "ada.example.com".to_string();
        assert!(matches!(service.register(bad_email, None).await, Err(AccountError::Validation(_))));

        let mut long_name = registration("Ada");
        long_name.name = "x".repeat(26);
        assert!(matches!(service.register(long_name, None).await, Err(AccountError::Validation(_))));

        assert_eq!(users.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_register_oversized_photo_rejected() {
        let (service, users, store) = service();
        let photo = staged_image(1024 * 1024 + 1);
        let path = photo.path().to_path_buf();

        let result = service.register(registration("Ada"), Some(photo)).await;

        assert!(matches!(result, Err(AccountError::PayloadTooLarge { .. })));
        assert_eq!(store.upload_count(), 0);
        assert!(!path.exists());
        assert_eq!(users.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_login() {
        let (service, _, _) = service();
        service.register(registration("Ada"), None).await.unwrap();

        let token = service
            .login(LoginRequest {
                email: " Ada@example.com ".to_string(),
                password: "secret1".to_string(),
            })
            .await
            .unwrap();
        assert!(service.authenticate(&token).await.is_ok());

        let wrong = service
            .login(LoginRequest {
                email: "ada@example.com".to_string(),
                password: "secret2".to_string(),
            })
            .await;
        assert!(matches!(wrong, Err(AccountError::InvalidCredentials)));

        let unknown = service
            .login(LoginRequest {
                email: "nobody@example.com".to_string(),
                password: "secret1".to_string(),
            })
            .await;
        assert!(matches!(unknown, Err(AccountError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_expired_or_unknown_token_unauthorized() {
        let users = MemoryUserRepository::with_users(&[user("Ada")]);
        let tokens = MemoryTokenRepository::default();
        let ada = users.search(None).await.unwrap().remove(0);
        let past = Utc::now() - Duration::days(1);
        tokens
            .insert(&AuthToken {
                id: Uuid::now_v7(),
                user_id: ada.id,
                token_hash: "digest:hdl_old".to_string(),
                created_at: past - Duration::days(7),
                expires_at: past,
            })
            .await
            .unwrap();
        let service = service_with(users, tokens.clone(), RecordingObjectStore::default());

        assert!(matches!(
            service.authenticate("hdl_old").await,
            Err(AccountError::Unauthorized(_))
        ));
        assert!(matches!(
            service.authenticate("hdl_never_issued").await,
            Err(AccountError::Unauthorized(_))
        ));
        assert_eq!(service.purge_expired_tokens().await.unwrap(), 1);
        assert_eq!(tokens.len(), 0);
    }

    #[tokio::test]
    async fn test_search_excludes_actor() {
        let (ada, bob, bea) = (user("Ada"), user("Bob"), user("Bea"));
        let users = MemoryUserRepository::with_users(&[ada.clone(), bob.clone(), bea.clone()]);
        let service = service_with(users, MemoryTokenRepository::default(), RecordingObjectStore::default());

        let all = service.search_users(&ada.id, None).await.unwrap();
        assert_eq!(all.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(), vec!["Bea", "Bob"]);

        let matched = service.search_users(&ada.id, Some(" BO ")).await.unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, bob.id);
    }

    #[tokio::test]
    async fn test_update_profile_replaces_photo_and_fields() {
        let (service, users, store) = service();
        let token = service.register(registration("Ada"), None).await.unwrap();
        let ada = service.authenticate(&token).await.unwrap();

        let request = UpdateProfileRequest {
            name: Some(" Ada L ".to_string()),
            username: None,
            status: Some("Busy".to_string()),
        };
        let updated = service
            .update_profile(&ada.id, request, Some(staged_image(64)))
            .await
            .unwrap();
        assert_eq!(updated.name, "Ada L");
        assert_eq!(updated.status, "Busy");
        assert!(!updated.photo.is_placeholder());
        // Placeholder owns nothing in storage.
        assert!(store.deleted().is_empty());

        let first_ref = updated.photo.delete_ref.clone().unwrap();
        let again = service
            .update_profile(&ada.id, UpdateProfileRequest::default(), Some(staged_image(64)))
            .await
            .unwrap();
        assert_eq!(store.deleted(), vec![first_ref]);
        assert_eq!(users.get(&ada.id).unwrap().photo, again.photo);
    }

    #[tokio::test]
    async fn test_update_profile_username_taken() {
        let (service, _, _) = service();
        service.register(registration("Ada"), None).await.unwrap();
        let token = service.register(registration("Bob"), None).await.unwrap();
        let bob = service.authenticate(&token).await.unwrap();

        let request = UpdateProfileRequest {
            username: Some("ada".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.update_profile(&bob.id, request, None).await,
            Err(AccountError::UsernameTaken(_))
        ));

        let request = UpdateProfileRequest {
            status: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.update_profile(&bob.id, request, None).await,
            Err(AccountError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_profile_failed_delete_keeps_old_photo() {
        let (service, users, store) = service();
        let token = service.register(registration("Ada"), Some(staged_image(64))).await.unwrap();
        let ada = service.authenticate(&token).await.unwrap();

        store.fail_deletes(true);
        let result = service
            .update_profile(&ada.id, UpdateProfileRequest::default(), Some(staged_image(64)))
            .await;

        assert!(matches!(result, Err(AccountError::Upstream(_))));
        assert_eq!(users.get(&ada.id).unwrap().photo, ada.photo);
    }

    #[tokio::test]
    async fn test_remove_profile_photo() {
        let (service, _, store) = service();
        let token = service.register(registration("Ada"), Some(staged_image(64))).await.unwrap();
        let ada = service.authenticate(&token).await.unwrap();
        let stored_ref = ada.photo.delete_ref.clone().unwrap();

        let wrong = RemoveProfilePhotoRequest {
            photo_ref: Some("other.png".to_string()),
        };
        assert!(matches!(
            service.remove_profile_photo(&ada.id, wrong).await,
            Err(AccountError::Validation(_))
        ));

        let right = RemoveProfilePhotoRequest {
            photo_ref: Some(stored_ref.clone()),
        };
        let reset = service.remove_profile_photo(&ada.id, right).await.unwrap();
        assert_eq!(reset.photo, ImageRef::placeholder(AVATAR));
        assert_eq!(store.deleted(), vec![stored_ref]);
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let (service, _, _) = service();
        assert!(matches!(
            service.get_user("nope").await,
            Err(AccountError::NotFound(_))
        ));
        assert!(matches!(
            service.get_user(&UserId::new().to_string()).await,
            Err(AccountError::NotFound(_))
        ));
    }
}
