//! Direct-message and chat-list handlers.

use std::time::Instant;

use axum::Json;
use axum::extract::State;

use huddle_types::chat::{ChatView, SendDirectMessageRequest};

use crate::http::error::AppError;
use crate::http::extractors::auth::CurrentUser;
use crate::http::extractors::payload::Payload;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/chats - Message one user, creating the direct chat on first contact.
pub async fn send_direct_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Payload<SendDirectMessageRequest>,
) -> Result<Json<ApiResponse<ChatView>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let chat = state
        .conversations
        .send_direct_message(user.id, payload.body, payload.image)
        .await?;
    let elapsed = start.elapsed().as_millis() as u64;

    Ok(Json(
        ApiResponse::success(chat, request_id, elapsed).with_link("chats", "/api/chats"),
    ))
}

/// GET /api/chats - Every chat the caller belongs to, most recent first.
pub async fn list_chats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<Vec<ChatView>>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let chats = state.conversations.list_chats(user.id).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    Ok(Json(
        ApiResponse::success(chats, request_id, elapsed).with_link("self", "/api/chats"),
    ))
}
