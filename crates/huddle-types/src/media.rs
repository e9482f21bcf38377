//! Stored image references.
//!
//! Object storage hands back a public URL plus an opaque deletion handle.
//! Placeholder images (default avatars, default group photo) carry no handle
//! because nothing was uploaded for them.

use serde::{Deserialize, Serialize};

/// Upper bound on any uploaded image: 1 MiB.
pub const MAX_IMAGE_BYTES: u64 = 1024 * 1024;

/// A URL plus the handle needed to delete the underlying object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub url: String,
    pub delete_ref: Option<String>,
}

impl ImageRef {
    pub fn new(url: impl Into<String>, delete_ref: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            delete_ref: Some(delete_ref.into()),
        }
    }

    /// A fixed default image that owns no stored object.
    pub fn placeholder(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            delete_ref: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.delete_ref.is_none()
    }
}
