//! Credential exchange and identity handlers.

use std::time::Instant;

use axum::Json;
use axum::extract::State;

use huddle_types::user::{LoginRequest, TokenResponse, User};

use crate::http::error::AppError;
use crate::http::extractors::auth::CurrentUser;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/auth - Exchange email and password for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<ApiResponse<TokenResponse>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let token = state.accounts.login(body).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    Ok(Json(
        ApiResponse::success(TokenResponse { token }, request_id, elapsed)
            .with_link("me", "/api/auth"),
    ))
}

/// GET /api/auth - Resolve the caller's own profile.
pub async fn me(
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();
    let elapsed = start.elapsed().as_millis() as u64;

    let self_link = format!("/api/users/{}", user.id);
    Ok(Json(
        ApiResponse::success(user, request_id, elapsed).with_link("self", &self_link),
    ))
}
