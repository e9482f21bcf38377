use thiserror::Error;

/// Errors from conversation operations (direct chats and groups).
///
/// Every variant except `Upstream` is a rule violation detected before any
/// side effect, and carries a message fit to show an end user.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),

    #[error("Image size must be less than {limit_kib} KiB.")]
    PayloadTooLarge { limit_kib: u64 },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("A group with these participants already exists.")]
    DuplicateGroup,

    #[error("Participant is already in the group.")]
    AlreadyMember,

    #[error("{0}")]
    NotMember(String),

    /// Storage or object-storage failure. The detail is for logs only.
    #[error("upstream failure: {0}")]
    Upstream(String),
}

/// Errors from account operations (registration, login, profile edits).
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),

    #[error("Image size must be less than {limit_kib} KiB.")]
    PayloadTooLarge { limit_kib: u64 },

    #[error("{0}")]
    NotFound(String),

    #[error("Email provided is already registered.")]
    EmailTaken,

    #[error("Username {0} is not available.")]
    UsernameTaken(String),

    #[error("The details do not match. Please check your details.")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(String),

    #[error("upstream failure: {0}")]
    Upstream(String),
}

/// Errors from repository and object-storage operations
/// (used by trait definitions in huddle-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    /// The stored row no longer satisfies the caller's expectation.
    #[error("precondition failed: {0}")]
    Precondition(String),
}
