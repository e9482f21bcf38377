//! Bearer token authentication extractor.
//!
//! Extracts the token from:
//! - `Authorization: Bearer <token>` header
//! - `x-auth-token: <token>` header
//! - `?token=<token>` query parameter (browsers cannot set headers on a
//!   WebSocket upgrade)
//!
//! Tokens are resolved through `AccountService::authenticate`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use huddle_types::user::User;

use crate::http::error::AppError;
use crate::state::AppState;

const MISSING_TOKEN: &str = "Not authorized, no token.";

/// The authenticated caller. Extracting this validates the bearer token.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts)?;
        let user = state.accounts.authenticate(&token).await?;
        Ok(CurrentUser(user))
    }
}

/// Extract the bearer token from headers or the query string.
fn extract_token(parts: &Parts) -> Result<String, AppError> {
    if let Some(auth) = parts.headers.get("authorization") {
        let auth_str = auth.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid Authorization header encoding".to_string())
        })?;
        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            return non_empty(token);
        }
    }

    if let Some(token) = parts.headers.get("x-auth-token") {
        let token_str = token.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid x-auth-token header encoding".to_string())
        })?;
        return non_empty(token_str);
    }

    if let Some(token) = parts.uri.query().and_then(token_from_query) {
        return non_empty(&token);
    }

    Err(AppError::Unauthorized(MISSING_TOKEN.to_string()))
}

fn non_empty(token: &str) -> Result<String, AppError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::Unauthorized(MISSING_TOKEN.to_string()));
    }
    Ok(token.to_string())
}

/// `token` value from a raw query string. Issued tokens are plain hex, so no
/// percent-decoding is needed.
fn token_from_query(query: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "token")
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_header() {
        let p = parts(Request::builder().uri("/api/chats").header("authorization", "Bearer hdl_abc"));
        assert_eq!(extract_token(&p).unwrap(), "hdl_abc");
    }

    #[test]
    fn test_x_auth_token_header() {
        let p = parts(Request::builder().uri("/api/chats").header("x-auth-token", " hdl_abc "));
        assert_eq!(extract_token(&p).unwrap(), "hdl_abc");
    }

    #[test]
    fn test_query_token() {
        let p = parts(Request::builder().uri("/ws?room=1&token=hdl_abc"));
        assert_eq!(extract_token(&p).unwrap(), "hdl_abc");
    }

    #[test]
    fn test_missing_or_blank_token() {
        let p = parts(Request::builder().uri("/api/chats"));
        assert!(matches!(extract_token(&p), Err(AppError::Unauthorized(_))));

        let p = parts(Request::builder().uri("/api/chats").header("authorization", "Bearer   "));
        assert!(matches!(extract_token(&p), Err(AppError::Unauthorized(_))));
    }
}
