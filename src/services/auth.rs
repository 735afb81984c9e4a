//! Accounts: password hashing, login sessions and password-reset links.
//!
//! Sessions are HS256 JWTs whose `jti` must also exist in Redis, so logout
//! can revoke them. Reset tokens are `{issued_at}-{sha256}` where the hash
//! covers the user's current password hash and last login; changing either
//! invalidates every outstanding link.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use constant_time_eq::constant_time_eq;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::info;

use crate::{
    error::{AppError, AppResult, FormErrors},
    forms::{LoginInput, SignupInput},
    models::User,
};

pub fn hash_password(password: &str) -> AppResult<String> {
    hash_password_with_cost(password, bcrypt::DEFAULT_COST)
}

pub fn hash_password_with_cost(password: &str, cost: u32) -> AppResult<String> {
    bcrypt::hash(password, cost).map_err(|e| AppError::Internal(format!("bcrypt: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/* ---------- sessions ---------- */

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_session_token(
    user_id: i64,
    username: &str,
    secret: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> AppResult<(String, Claims)> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        jti: uuid::Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::Internal(format!("jwt encode: {e}")))?;
    Ok((token, claims))
}

pub fn decode_session_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| AppError::Unauthorized("Your session has expired. Please log in again.".to_string()))
}

/* ---------- password reset ---------- */

pub fn encode_uid(user_id: i64) -> String {
    URL_SAFE_NO_PAD.encode(user_id.to_string())
}

pub fn decode_uid(uid: &str) -> Option<i64> {
    let bytes = URL_SAFE_NO_PAD.decode(uid.trim_end_matches('=')).ok()?;
    String::from_utf8(bytes).ok()?.parse().ok()
}

fn reset_hash(user: &User, secret: &str, issued_at: i64) -> String {
    let last_login = user.last_login.map(|t| t.timestamp()).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}:{}:{}", secret, user.id, user.password_hash, last_login, issued_at).as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn make_reset_token(user: &User, secret: &str, now: DateTime<Utc>) -> String {
    let issued_at = now.timestamp();
    format!("{}-{}", issued_at, reset_hash(user, secret, issued_at))
}

pub fn check_reset_token(
    user: &User,
    token: &str,
    secret: &str,
    now: DateTime<Utc>,
    timeout_seconds: i64,
) -> bool {
    let Some((issued_at, hash)) = token.split_once('-') else {
        return false;
    };
    let Ok(issued_at) = issued_at.parse::<i64>() else {
        return false;
    };
    let age = now.timestamp() - issued_at;
    if !(0..=timeout_seconds).contains(&age) {
        return false;
    }
    constant_time_eq(reset_hash(user, secret, issued_at).as_bytes(), hash.as_bytes())
}

/* ---------- accounts ---------- */

pub async fn authenticate(pool: &PgPool, input: &LoginInput, now: DateTime<Utc>) -> AppResult<User> {
    let invalid = || AppError::Unauthorized("Invalid username or password.".to_string());

    let user = User::find_by_username(&input.username, pool).await?.ok_or_else(invalid)?;
    if !verify_password(&input.password, &user.password_hash) {
        return Err(invalid());
    }

    sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
        .bind(user.id)
        .bind(now)
        .execute(pool)
        .await?;

    info!("user {} logged in", user.username);
    Ok(User { last_login: Some(now), ..user })
}

pub async fn register(pool: &PgPool, input: &SignupInput, now: DateTime<Utc>) -> AppResult<User> {
    if User::find_by_username(&input.username, pool).await?.is_some() {
        return Err(AppError::validation(
            "username",
            "Username already exists. Please choose a different username.",
        ));
    }
    if let Some(email) = input.email.as_deref() {
        if User::find_by_email(email, pool).await?.is_some() {
            return Err(AppError::validation(
                "email",
                "Email already exists. Please use a different email or try logging in.",
            ));
        }
    }

    let password_hash = hash_password(&input.password)?;
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, password_hash, date_joined, last_login)
        VALUES ($1, $2, $3, $4, $4)
        RETURNING *
        "#,
    )
    .bind(&input.username)
    .bind(input.email.as_deref().unwrap_or_default())
    .bind(&password_hash)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        // Lost a race against another signup with the same name
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Validation(FormErrors::single(
            FormErrors::NON_FIELD,
            "Error creating account. Please try again.",
        )),
        other => AppError::Database(other),
    })?;

    info!("created account {}", user.username);
    Ok(user)
}

pub async fn set_password(pool: &PgPool, user_id: i64, new_password: &str) -> AppResult<()> {
    let password_hash = hash_password(new_password)?;
    sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(user_id)
        .bind(password_hash)
        .execute(pool)
        .await?;
    Ok(())
}
