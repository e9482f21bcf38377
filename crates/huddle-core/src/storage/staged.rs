//! An uploaded file parked on local disk until it is stored or rejected.
//!
//! `StagedImage` owns its temp file: dropping the value removes the file, so
//! every exit path of a request (rejection, upload failure, success, or the
//! client going away mid-request) releases it.

use std::path::Path;

use tempfile::{NamedTempFile, TempPath};

#[derive(Debug)]
pub struct StagedImage {
    path: TempPath,
    size_bytes: u64,
    file_name: Option<String>,
    content_type: Option<String>,
}

impl StagedImage {
    /// Take ownership of a fully written temp file.
    pub fn from_temp_file(
        file: NamedTempFile,
        size_bytes: u64,
        file_name: Option<String>,
        content_type: Option<String>,
    ) -> Self {
        Self {
            path: file.into_temp_path(),
            size_bytes,
            file_name,
            content_type,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Lowercased file extension, taken from the client file name first and
    /// the content type second. Falls back to `bin`.
    pub fn extension(&self) -> String {
        let from_name = self
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
        if let Some(ext) = from_name {
            return ext.to_ascii_lowercase();
        }

        match self.content_type.as_deref() {
            Some("image/jpeg") => "jpg".to_string(),
            Some("image/png") => "png".to_string(),
            Some("image/gif") => "gif".to_string(),
            Some("image/webp") => "webp".to_string(),
            _ => "bin".to_string(),
        }
    }
}
