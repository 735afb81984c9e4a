use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use std::sync::Arc;

use crate::{error::AppError, services::auth::decode_session_token, AppState};

pub const SESSION_COOKIE: &str = "session";

/// A logged-in user, resolved from a live session.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
    pub jti: String,
}

/// Optional login. Anonymous requests, expired tokens and revoked sessions
/// all resolve to `None`.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

impl MaybeUser {
    pub fn user_id(&self) -> Option<i64> {
        self.0.as_ref().map(|u| u.user_id)
    }
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

/// Session token from `Authorization: Bearer` or the session cookie.
fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .or_else(|| cookie_value(headers, SESSION_COOKIE))
        .filter(|t| !t.is_empty())
}

pub fn session_cookie(token: &str, max_age_seconds: i64) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}")
}

pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers) else {
            return Ok(MaybeUser(None));
        };
        let Ok(claims) = decode_session_token(token, &state.config.jwt.secret) else {
            return Ok(MaybeUser(None));
        };

        // Logout deletes the Redis record, which revokes the token early
        let user = match state.cache.session_user(&claims.jti).await? {
            Some(user_id) if user_id == claims.sub => Some(AuthUser {
                user_id,
                username: claims.username,
                jti: claims.jti,
            }),
            _ => None,
        };
        Ok(MaybeUser(user))
    }
}
