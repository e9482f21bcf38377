//! Query parameter extractors for list endpoints.

use serde::Deserialize;

/// Query parameters for `GET /api/users`.
#[derive(Debug, Deserialize, Default)]
pub struct UserSearchQuery {
    /// Case-insensitive substring of a name or username.
    pub search: Option<String>,
}
