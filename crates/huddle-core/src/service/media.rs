//! Image intake shared by conversations and accounts.
//!
//! Enforces the upload size limit before any storage call, uploads staged
//! files, and cleans up objects that end up unreferenced.

use huddle_types::error::{AccountError, ChatError, RepositoryError};
use huddle_types::media::ImageRef;
use thiserror::Error;
use tracing::{debug, warn};

use crate::storage::object_store::ObjectStore;
use crate::storage::staged::StagedImage;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("image of {size_bytes} bytes exceeds the {limit_bytes} byte limit")]
    TooLarge { size_bytes: u64, limit_bytes: u64 },

    #[error("object storage: {0}")]
    Store(#[from] RepositoryError),
}

impl MediaError {
    fn limit_kib(limit_bytes: u64) -> u64 {
        limit_bytes / 1024
    }
}

impl From<MediaError> for ChatError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::TooLarge { limit_bytes, .. } => ChatError::PayloadTooLarge {
                limit_kib: MediaError::limit_kib(limit_bytes),
            },
            MediaError::Store(e) => ChatError::Upstream(e.to_string()),
        }
    }
}

impl From<MediaError> for AccountError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::TooLarge { limit_bytes, .. } => AccountError::PayloadTooLarge {
                limit_kib: MediaError::limit_kib(limit_bytes),
            },
            MediaError::Store(e) => AccountError::Upstream(e.to_string()),
        }
    }
}

/// Wraps an [`ObjectStore`] with the size policy.
pub struct MediaService<O: ObjectStore> {
    store: O,
    max_bytes: u64,
}

impl<O: ObjectStore> MediaService<O> {
    pub fn new(store: O, max_bytes: u64) -> Self {
        Self { store, max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Reject an oversized image. Never touches storage.
    pub fn check(&self, image: &StagedImage) -> Result<(), MediaError> {
        if image.size_bytes() > self.max_bytes {
            return Err(MediaError::TooLarge {
                size_bytes: image.size_bytes(),
                limit_bytes: self.max_bytes,
            });
        }
        Ok(())
    }

    /// Check, then upload. The staged file is released when this returns,
    /// whatever the outcome.
    pub async fn store(&self, image: StagedImage) -> Result<ImageRef, MediaError> {
        self.check(&image)?;
        let stored = self.store.upload(&image).await?;
        debug!(url = %stored.url, bytes = image.size_bytes(), "stored image");
        Ok(stored)
    }

    /// Upload when an image was supplied.
    pub async fn store_optional(
        &self,
        image: Option<StagedImage>,
    ) -> Result<Option<ImageRef>, MediaError> {
        match image {
            Some(image) => Ok(Some(self.store(image).await?)),
            None => Ok(None),
        }
    }

    /// Delete the object behind `image`. Placeholders own nothing.
    pub async fn delete(&self, image: &ImageRef) -> Result<(), MediaError> {
        if let Some(delete_ref) = image.delete_ref.as_deref() {
            self.store.delete(delete_ref).await?;
        }
        Ok(())
    }

    /// Best-effort removal of an object that nothing will reference.
    pub async fn discard(&self, image: &ImageRef) {
        if let Err(e) = self.delete(image).await {
            warn!(url = %image.url, error = %e, "failed to discard orphaned image");
        }
    }
}
