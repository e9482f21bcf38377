//! Request bodies that may carry an image.
//!
//! Endpoints that accept a photo take either a JSON body or
//! `multipart/form-data`. Text parts are folded into a JSON object and
//! deserialized into the request struct; the first file part is streamed to
//! a temp file under the staging directory and handed over as a
//! [`StagedImage`]. The temp file is removed when the `StagedImage` (or the
//! half-written file, on any error) is dropped.

use std::path::Path;

use axum::body::Bytes;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;

use huddle_core::storage::staged::StagedImage;

use crate::http::error::AppError;
use crate::state::AppState;

/// A deserialized request body plus an optional staged upload.
pub struct Payload<T> {
    pub body: T,
    pub image: Option<StagedImage>,
}

impl<T> FromRequest<AppState> for Payload<T>
where
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            return read_multipart(multipart, &state.staging_dir, state.config.max_image_bytes)
                .await;
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        Ok(Self {
            body: parse_json(&bytes)?,
            image: None,
        })
    }
}

/// An empty body reads as `{}` so every request struct's defaults apply.
fn parse_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AppError> {
    let result = if bytes.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_str("{}")
    } else {
        serde_json::from_slice(bytes)
    };
    result.map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))
}

async fn read_multipart<T: DeserializeOwned>(
    mut multipart: Multipart,
    staging_dir: &Path,
    max_bytes: u64,
) -> Result<Payload<T>, AppError> {
    let mut fields = Vec::new();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if field.file_name().is_some() {
            if image.is_none() {
                image = stage_field(field, staging_dir, max_bytes).await?;
            }
            continue;
        }
        let value = field
            .text()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?;
        fields.push((name, value));
    }

    let body = serde_json::from_value(form_value(fields))
        .map_err(|e| AppError::Validation(format!("Invalid form data: {e}")))?;
    Ok(Payload { body, image })
}

/// Stream one file part to disk. Bytes past `max_bytes` are counted but not
/// written, so the size check downstream sees the true length. An empty part
/// (a form submitted with no file chosen) yields `None`.
async fn stage_field(
    mut field: Field<'_>,
    staging_dir: &Path,
    max_bytes: u64,
) -> Result<Option<StagedImage>, AppError> {
    let file_name = field.file_name().map(str::to_string);
    let content_type = field.content_type().map(str::to_string);

    let temp = tempfile::Builder::new()
        .prefix("upload-")
        .tempfile_in(staging_dir)
        .map_err(|e| AppError::Internal(format!("staging file: {e}")))?;
    let handle = temp
        .as_file()
        .try_clone()
        .map_err(|e| AppError::Internal(format!("staging file: {e}")))?;
    let mut out = tokio::fs::File::from_std(handle);

    let mut size: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if size <= max_bytes {
            out.write_all(&chunk)
                .await
                .map_err(|e| AppError::Internal(format!("staging write: {e}")))?;
        }
        size += chunk.len() as u64;
    }
    out.flush()
        .await
        .map_err(|e| AppError::Internal(format!("staging write: {e}")))?;
    drop(out);

    if size == 0 {
        return Ok(None);
    }
    tracing::debug!(size_bytes = size, "upload staged");
    Ok(Some(StagedImage::from_temp_file(
        temp,
        size,
        file_name,
        content_type,
    )))
}

fn multipart_error(e: MultipartError, max_bytes: u64) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::Validation(format!(
            "Image size must be less than {} KiB.",
            max_bytes / 1024
        ));
    }
    AppError::Validation(e.body_text())
}

/// Fold form fields into a JSON object. Repeated names (`userIds`,
/// `userIds[]`) collect into an array.
fn form_value(fields: Vec<(String, String)>) -> Value {
    let mut map = Map::new();
    for (name, value) in fields {
        let name = name.trim_end_matches("[]").to_string();
        match map.get_mut(&name) {
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None => {
                map.insert(name, Value::String(value));
            }
        }
    }
    Value::Object(map)
}
