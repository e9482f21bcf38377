//! Group chat handlers: creation, membership, messages and details.
//!
//! Each handler resolves the caller, delegates to the conversation manager
//! and wraps the resolved chat in the response envelope. Live events for the
//! other members are emitted by the manager after the change commits.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};

use huddle_types::chat::{
    ChatView, CreateGroupRequest, EditGroupRequest, GroupMemberRequest, GroupMessageRequest,
    RemoveGroupPhotoRequest,
};

use crate::http::error::AppError;
use crate::http::extractors::auth::CurrentUser;
use crate::http::extractors::payload::Payload;
use crate::http::response::ApiResponse;
use crate::state::AppState;

fn envelope(chat: ChatView, request_id: String, start: Instant) -> Json<ApiResponse<ChatView>> {
    let elapsed = start.elapsed().as_millis() as u64;
    Json(ApiResponse::success(chat, request_id, elapsed).with_link("chats", "/api/chats"))
}

/// POST /api/chats/group - Create a group with the caller as admin.
pub async fn create_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Payload<CreateGroupRequest>,
) -> Result<Json<ApiResponse<ChatView>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let chat = state
        .conversations
        .create_group(user.id, payload.body, payload.image)
        .await?;
    Ok(envelope(chat, request_id, start))
}

/// PUT /api/chats/group - Rename the group and/or replace its photo.
pub async fn edit_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Payload<EditGroupRequest>,
) -> Result<Json<ApiResponse<ChatView>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let chat = state
        .conversations
        .edit_group(user.id, payload.body, payload.image)
        .await?;
    Ok(envelope(chat, request_id, start))
}

/// PUT /api/chats/group/newMessage - Post a message to a group.
pub async fn append_group_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Payload<GroupMessageRequest>,
) -> Result<Json<ApiResponse<ChatView>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let chat = state
        .conversations
        .append_group_message(user.id, payload.body, payload.image)
        .await?;
    Ok(envelope(chat, request_id, start))
}

/// PUT /api/chats/group/addUser
pub async fn add_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<GroupMemberRequest>,
) -> Result<Json<ApiResponse<ChatView>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let chat = state.conversations.add_member(user.id, body).await?;
    Ok(envelope(chat, request_id, start))
}

/// PUT /api/chats/group/removeUser
pub async fn remove_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<GroupMemberRequest>,
) -> Result<Json<ApiResponse<ChatView>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let chat = state.conversations.remove_member(user.id, body).await?;
    Ok(envelope(chat, request_id, start))
}

/// PUT /api/chats/group/removephoto - Reset the group photo to the placeholder.
pub async fn remove_group_photo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<RemoveGroupPhotoRequest>,
) -> Result<Json<ApiResponse<ChatView>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let chat = state.conversations.remove_group_photo(user.id, body).await?;
    Ok(envelope(chat, request_id, start))
}

/// PUT /api/chats/group/leavegroup/{id}
pub async fn leave_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(group_id): Path<String>,
) -> Result<Json<ApiResponse<ChatView>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let chat = state.conversations.leave_group(user.id, &group_id).await?;
    Ok(envelope(chat, request_id, start))
}
