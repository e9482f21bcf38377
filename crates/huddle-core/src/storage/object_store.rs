//! Object store trait.
//!
//! Uploaded images (chat attachments, profile and group photos) live outside
//! the database. The store hands back a public URL plus an opaque handle that
//! is later needed to delete the object.

use huddle_types::error::RepositoryError;
use huddle_types::media::ImageRef;

use super::staged::StagedImage;

/// Trait for image object storage.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Implementations live in huddle-infra.
pub trait ObjectStore: Send + Sync {
    /// Persist a staged image and return where it can be fetched.
    ///
    /// The returned reference always carries a `delete_ref`.
    fn upload(
        &self,
        image: &StagedImage,
    ) -> impl std::future::Future<Output = Result<ImageRef, RepositoryError>> + Send;

    /// Delete the object behind `delete_ref`. Deleting a missing object succeeds.
    fn delete(
        &self,
        delete_ref: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
