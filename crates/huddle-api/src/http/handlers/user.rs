//! Registration, directory and profile handlers.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};

use huddle_types::user::{
    DirectoryEntry, RegisterRequest, RemoveProfilePhotoRequest, TokenResponse,
    UpdateProfileRequest, User,
};

use crate::http::error::AppError;
use crate::http::extractors::auth::CurrentUser;
use crate::http::extractors::payload::Payload;
use crate::http::extractors::query::UserSearchQuery;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/users - Register a new account (JSON or multipart with a photo).
pub async fn register(
    State(state): State<AppState>,
    payload: Payload<RegisterRequest>,
) -> Result<Json<ApiResponse<TokenResponse>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let token = state
        .accounts
        .register(payload.body, payload.image)
        .await?;
    let elapsed = start.elapsed().as_millis() as u64;

    Ok(Json(
        ApiResponse::success(TokenResponse { token }, request_id, elapsed)
            .with_link("me", "/api/auth"),
    ))
}

/// GET /api/users?search= - Search the directory, excluding the caller.
pub async fn search_users(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<UserSearchQuery>,
) -> Result<Json<ApiResponse<Vec<DirectoryEntry>>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let found = state
        .accounts
        .search_users(&user.id, query.search.as_deref())
        .await?;
    let elapsed = start.elapsed().as_millis() as u64;

    Ok(Json(ApiResponse::success(found, request_id, elapsed)))
}

/// GET /api/users/{id} - Public profile of any user.
pub async fn get_user(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let user = state.accounts.get_user(&id).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let self_link = format!("/api/users/{}", user.id);
    Ok(Json(
        ApiResponse::success(user, request_id, elapsed).with_link("self", &self_link),
    ))
}

/// PUT /api/users - Edit name, username, status and/or photo.
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Payload<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let updated = state
        .accounts
        .update_profile(&user.id, payload.body, payload.image)
        .await?;
    let elapsed = start.elapsed().as_millis() as u64;

    Ok(Json(ApiResponse::success(updated, request_id, elapsed)))
}

/// PUT /api/users/removephoto - Reset the profile photo to the placeholder.
pub async fn remove_profile_photo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<RemoveProfilePhotoRequest>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let updated = state.accounts.remove_profile_photo(&user.id, body).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    Ok(Json(ApiResponse::success(updated, request_id, elapsed)))
}
