use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::media::ImageRef;

/// Status text given to every newly registered user.
pub const DEFAULT_STATUS: &str = "Available";

/// Maximum length (in characters) of a display name or username.
pub const MAX_NAME_CHARS: usize = 25;

/// Maximum length (in characters) of a status line.
pub const MAX_STATUS_CHARS: usize = 100;

/// Unique identifier for a user, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Create a new UserId using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// A registered account.
///
/// `password_hash` is an Argon2 PHC string and is never serialized.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Unique, stored lowercase.
    pub email: String,
    /// Unique handle.
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub status: String,
    pub photo: ImageRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Projection used wherever a chat references this user.
    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            id: self.id,
            name: self.name.clone(),
            photo: self.photo.url.clone(),
        }
    }

    pub fn directory_entry(&self) -> DirectoryEntry {
        DirectoryEntry {
            id: self.id,
            name: self.name.clone(),
            username: self.username.clone(),
            photo: self.photo.url.clone(),
        }
    }
}

/// The id/name/photo triple that chats embed for members, admins and senders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: UserId,
    pub name: String,
    pub photo: String,
}

impl ProfileSummary {
    /// Stand-in for a reference whose user row no longer resolves.
    pub fn unknown(id: UserId) -> Self {
        Self {
            id,
            name: "Unknown user".to_string(),
            photo: String::new(),
        }
    }
}

/// A search result from the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub photo: String,
}

/// Registration form. The optional profile photo travels separately as a staged upload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Credential exchange for a bearer token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Self-service profile edit. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub username: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoveProfilePhotoRequest {
    #[serde(rename = "profilePicturePublicID", alias = "photoRef")]
    pub photo_ref: Option<String>,
}

/// Response body for a successful login or registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Loose syntactic email check: one `@`, non-empty local part, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.contains(char::is_whitespace)
        && domain
            .split('.')
            .filter(|part| !part.is_empty())
            .count()
            >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Passwords are 6-15 characters with at least one letter and one digit.
pub fn is_valid_password(password: &str) -> bool {
    let len = password.chars().count();
    (6..=15).contains(&len)
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| c.is_ascii_alphabetic())
}
