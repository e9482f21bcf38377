//! Local filesystem object store.
//!
//! Staged uploads are copied into `{media_dir}/{uuid}.{ext}`. The public URL
//! is `{public_base_url}/media/{file}` and the deletion handle is the bare
//! file name.

use std::path::{Path, PathBuf};

use huddle_core::storage::object_store::ObjectStore;
use huddle_core::storage::staged::StagedImage;
use huddle_types::error::RepositoryError;
use huddle_types::media::ImageRef;
use tracing::debug;
use uuid::Uuid;

/// URL path prefix the API serves `media_dir` under.
pub const MEDIA_ROUTE: &str = "/media";

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    media_dir: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    /// `public_base_url` is the externally visible origin, e.g. `http://127.0.0.1:5000`.
    pub fn new(media_dir: PathBuf, public_base_url: impl Into<String>) -> Self {
        Self {
            media_dir,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Map a deletion handle to its file, refusing anything that could
    /// escape the media directory.
    fn object_path(&self, delete_ref: &str) -> Result<PathBuf, RepositoryError> {
        let valid = !delete_ref.is_empty()
            && delete_ref != "."
            && delete_ref != ".."
            && !delete_ref.contains(['/', '\\'])
            && !delete_ref.contains('\0');
        if !valid {
            return Err(RepositoryError::Query(format!(
                "invalid object reference: {delete_ref:?}"
            )));
        }
        Ok(self.media_dir.join(delete_ref))
    }
}

impl ObjectStore for LocalObjectStore {
    async fn upload(&self, image: &StagedImage) -> Result<ImageRef, RepositoryError> {
        tokio::fs::create_dir_all(&self.media_dir)
            .await
            .map_err(|e| RepositoryError::Query(format!("failed to create media dir: {e}")))?;

        let file_name = format!("{}.{}", Uuid::now_v7(), image.extension());
        let target = self.media_dir.join(&file_name);
        tokio::fs::copy(image.path(), &target)
            .await
            .map_err(|e| RepositoryError::Query(format!("failed to store image: {e}")))?;

        debug!(file = %file_name, bytes = image.size_bytes(), "stored media object");
        Ok(ImageRef::new(
            format!("{}{MEDIA_ROUTE}/{file_name}", self.public_base_url),
            file_name,
        ))
    }

    async fn delete(&self, delete_ref: &str) -> Result<(), RepositoryError> {
        let path = self.object_path(delete_ref)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(file = %delete_ref, "deleted media object");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RepositoryError::Query(format!(
                "failed to delete {delete_ref}: {e}"
            ))),
        }
    }
}
