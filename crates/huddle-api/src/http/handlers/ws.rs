//! WebSocket handler for the per-user live channel.
//!
//! The `/ws` endpoint authenticates the bearer token on upgrade. Once
//! connected, the handler:
//!
//! - **Joins:** a `join` frame naming the authenticated user registers the
//!   socket with the [`PresenceRouter`]. From then on every [`LiveEvent`]
//!   routed to that user is pushed as a JSON text frame.
//! - **Relays typing:** `typing` / `stop_typing` frames are fanned out to
//!   the other members of the chat.
//! - **Answers pings** with `{"event":"pong"}`.
//!
//! Malformed frames and rejected actions are answered with an `error` frame.
//! The connection is unregistered when the socket closes.
//!
//! [`PresenceRouter`]: huddle_core::live::router::PresenceRouter

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use huddle_core::live::router::LiveConnection;
use huddle_types::chat::ChatId;
use huddle_types::event::LiveEvent;
use huddle_types::user::{User, UserId};

use crate::http::extractors::auth::CurrentUser;
use crate::state::AppState;

/// Incoming frame from a WebSocket client, tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    /// Start receiving live events for `user_id` (must be the caller).
    #[serde(alias = "setup")]
    Join { user_id: String },
    Typing { chat_id: String },
    StopTyping { chat_id: String },
    Ping,
}

/// Direct replies to a client frame, tagged by `event` like [`LiveEvent`].
#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Reply {
    Pong,
    Error { message: String },
}

impl Reply {
    fn error(message: impl Into<String>) -> Self {
        Reply::Error {
            message: message.into(),
        }
    }
}

/// Upgrade an authenticated HTTP request to a live-channel WebSocket.
///
/// This is mounted at `/ws` in the router.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, user))
}

/// Core WebSocket connection handler.
///
/// Uses `tokio::select!` to multiplex between the connection's outbound
/// queue and incoming client frames, keeping both halves in one task.
async fn handle_ws_connection(socket: WebSocket, state: AppState, user: User) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut connection: Option<LiveConnection> = None;

    loop {
        tokio::select! {
            event = next_event(&mut connection) => {
                let Some(event) = event else {
                    break;
                };
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if ws_sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(event = event.name(), "Failed to serialize LiveEvent: {err}");
                    }
                }
            }

            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        let reply = process_frame(&text, &state, &user, &mut connection).await;
                        if let Some(reply) = reply {
                            if !send_reply(&mut ws_sender, &reply).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    // Binary and protocol-level ping/pong frames are ignored.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    if let Some(conn) = connection {
        state.presence.unregister(&conn.user_id, conn.id);
    }
    tracing::debug!(user_id = %user.id, "WebSocket connection closed");
}

/// Next routed event, or never while the socket has not joined yet.
async fn next_event(connection: &mut Option<LiveConnection>) -> Option<LiveEvent> {
    match connection {
        Some(conn) => conn.receiver.recv().await,
        None => std::future::pending().await,
    }
}

async fn send_reply(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    reply: &Reply,
) -> bool {
    match serde_json::to_string(reply) {
        Ok(json) => ws_sender.send(Message::Text(json.into())).await.is_ok(),
        Err(err) => {
            tracing::warn!("Failed to serialize reply: {err}");
            true
        }
    }
}

/// Parse and process a single frame from the client.
async fn process_frame(
    text: &str,
    state: &AppState,
    user: &User,
    connection: &mut Option<LiveConnection>,
) -> Option<Reply> {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(error = %err, "Ignoring malformed WebSocket frame");
            return Some(Reply::error("Malformed frame."));
        }
    };

    match frame {
        ClientFrame::Join { user_id } => match check_join(&user_id, &user.id) {
            Ok(()) => {
                if connection.is_none() {
                    let conn = state.presence.register(user.id);
                    tracing::info!(user_id = %user.id, connection = %conn.id, "live channel joined");
                    *connection = Some(conn);
                }
                None
            }
            Err(reply) => Some(reply),
        },
        ClientFrame::Typing { chat_id } => relay_typing(state, user, &chat_id, true).await,
        ClientFrame::StopTyping { chat_id } => relay_typing(state, user, &chat_id, false).await,
        ClientFrame::Ping => Some(Reply::Pong),
    }
}

/// A socket may only join the channel of the user its token belongs to.
fn check_join(requested: &str, caller: &UserId) -> Result<(), Reply> {
    match requested.parse::<UserId>() {
        Ok(id) if id == *caller => Ok(()),
        _ => Err(Reply::error("Cannot join another user's channel.")),
    }
}

async fn relay_typing(state: &AppState, user: &User, chat_id: &str, started: bool) -> Option<Reply> {
    let Ok(chat_id) = chat_id.parse::<ChatId>() else {
        return Some(Reply::error("Chat not found."));
    };
    match state
        .conversations
        .broadcast_typing(user.id, &chat_id, started)
        .await
    {
        Ok(_) => None,
        Err(err) => {
            let (_, _, message) = crate::http::error::AppError::from(err).parts();
            Some(Reply::error(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_frames_parse() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"join","user_id":"abc"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Join { user_id } if user_id == "abc"));

        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"stop_typing","chat_id":"c1"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::StopTyping { chat_id } if chat_id == "c1"));

        let frame: ClientFrame = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Ping));

        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"shout"}"#).is_err());
    }

    #[test]
    fn test_reply_wire_shape() {
        assert_eq!(serde_json::to_string(&Reply::Pong).unwrap(), r#"{"event":"pong"}"#);
        let json = serde_json::to_value(Reply::error("nope")).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["message"], "nope");
    }

    #[test]
    fn test_join_requires_own_id() {
        let me = UserId::new();
        assert!(check_join(&me.to_string(), &me).is_ok());
        assert!(check_join(&UserId::new().to_string(), &me).is_err());
        assert!(check_join("garbage", &me).is_err());
    }
}
