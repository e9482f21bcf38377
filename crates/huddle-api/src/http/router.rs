//! Axum router configuration with middleware.
//!
//! REST routes are under `/api/`. The live channel is `/ws` and stored
//! images are served from the media directory under `/media`.
//! Middleware: CORS, tracing, body size limit.

use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use huddle_infra::storage::local::MEDIA_ROUTE;

use crate::http::handlers;
use crate::state::AppState;

/// Room for form fields and multipart framing on top of the image itself.
const BODY_OVERHEAD_BYTES: usize = 256 * 1024;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Oversized images must reach the size check rather than fail mid-stream.
    let body_limit = (state.config.max_image_bytes as usize)
        .saturating_mul(2)
        .saturating_add(BODY_OVERHEAD_BYTES);

    let api_routes = Router::new()
        // Identity
        .route(
            "/auth",
            post(handlers::auth::login).get(handlers::auth::me),
        )
        // Users
        .route(
            "/users",
            post(handlers::user::register)
                .get(handlers::user::search_users)
                .put(handlers::user::update_profile),
        )
        .route(
            "/users/removephoto",
            put(handlers::user::remove_profile_photo),
        )
        .route("/users/{id}", get(handlers::user::get_user))
        // Direct chats
        .route(
            "/chats",
            post(handlers::chat::send_direct_message).get(handlers::chat::list_chats),
        )
        // Groups
        .route(
            "/chats/group",
            post(handlers::group::create_group).put(handlers::group::edit_group),
        )
        .route(
            "/chats/group/newMessage",
            put(handlers::group::append_group_message),
        )
        .route("/chats/group/addUser", put(handlers::group::add_member))
        .route("/chats/group/removeUser", put(handlers::group::remove_member))
        .route(
            "/chats/group/removephoto",
            put(handlers::group::remove_group_photo),
        )
        .route(
            "/chats/group/leavegroup/{id}",
            put(handlers::group::leave_group),
        );

    let media = ServeDir::new(&state.media_dir);

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(handlers::ws::ws_handler))
        .route("/health", get(health_check))
        .nest_service(MEDIA_ROUTE, media)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "live_connections": state.presence.connection_count(),
    }))
}
