use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    error::{AppError, AppResult},
    flash::{self, FlashQuery, Message},
    forms::{AuthForm, ForgetPasswordForm, ResetPasswordForm},
    middleware::{clear_session_cookie, session_cookie, MaybeUser},
    models::User,
    services::auth,
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/", get(auth_page).post(auth_submit))
        .route("/login/", get(login_page).post(login_submit))
        .route("/signup/", get(signup_page).post(signup_submit))
        .route("/logout/", get(logout).post(logout))
        .route("/forget-password/", get(forget_password_page).post(forget_password))
        .route(
            "/reset-password/{uid}/{token}/",
            get(reset_password_page).post(reset_password),
        )
}

/* ---------- helpers ---------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Login,
    Signup,
}

impl Tab {
    fn as_str(self) -> &'static str {
        match self {
            Tab::Login => "login",
            Tab::Signup => "signup",
        }
    }
}

fn tab_location(tab: Tab, flash: &FlashQuery) -> String {
    let mut params = vec![("tab", tab.as_str())];
    if let Some(message) = flash.message.as_deref() {
        params.push(("message", message));
    }
    if let Some(error) = flash.error.as_deref() {
        params.push(("error", error));
    }
    let query = serde_urlencoded::to_string(params).unwrap_or_default();
    format!("/auth/?{query}")
}

fn tab_error(tab: Tab, err: &AppError) -> Response {
    flash::redirect_error(&format!("/auth/?tab={}", tab.as_str()), &err.user_message()).into_response()
}

/// Issues a session for `user` and redirects with the cookie set.
async fn start_session(state: &AppState, user: &User, redirect: Redirect) -> AppResult<Response> {
    let ttl = Duration::hours(state.config.jwt.expires_in_hours);
    let (token, claims) =
        auth::issue_session_token(user.id, &user.username, &state.config.jwt.secret, ttl, Utc::now())?;

    let ttl_seconds = ttl.num_seconds().max(1);
    state
        .cache
        .store_session(&claims.jti, user.id, ttl_seconds.unsigned_abs())
        .await?;

    Ok(([(header::SET_COOKIE, session_cookie(&token, ttl_seconds))], redirect).into_response())
}

async fn do_login(state: &AppState, form: &AuthForm) -> Response {
    let input = form.login_input();
    let result = async {
        let user = auth::authenticate(&state.db.pool, &input, Utc::now()).await?;
        let target = form.safe_next().unwrap_or_else(|| "/".to_string());
        start_session(state, &user, Redirect::to(&target)).await
    }
    .await;

    result.unwrap_or_else(|e| tab_error(Tab::Login, &e))
}

async fn do_signup(state: &AppState, form: &AuthForm) -> Response {
    let result = async {
        let input = form.signup_input()?;
        let user = auth::register(&state.db.pool, &input, Utc::now()).await?;
        let target = form.safe_next().unwrap_or_else(|| "/".to_string());
        let welcome = format!("Account created successfully! Welcome, {}!", user.username);
        start_session(state, &user, flash::redirect_success(&target, &welcome)).await
    }
    .await;

    result.unwrap_or_else(|e| tab_error(Tab::Signup, &e))
}

/* ---------- AUTH PAGE ---------- */

#[derive(Debug, Deserialize)]
pub struct AuthPageQuery {
    pub tab: Option<String>,
    pub next: Option<String>,
}

#[derive(Serialize)]
pub struct AuthPage {
    pub active_tab: &'static str,
    pub next: Option<String>,
    pub messages: Vec<Message>,
}

/// GET /auth/
pub async fn auth_page(
    user: MaybeUser,
    Query(params): Query<AuthPageQuery>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    if user.0.is_some() {
        return Redirect::to("/").into_response();
    }
    let active_tab = match params.tab.as_deref() {
        Some("signup") => Tab::Signup,
        _ => Tab::Login,
    };
    Json(AuthPage {
        active_tab: active_tab.as_str(),
        next: params.next,
        messages: flash.messages(),
    })
    .into_response()
}

/// POST /auth/
pub async fn auth_submit(
    State(state): State<Arc<AppState>>,
    user: MaybeUser,
    Form(form): Form<AuthForm>,
) -> Response {
    if user.0.is_some() {
        return Redirect::to("/").into_response();
    }
    match form.action.as_deref() {
        Some("login") => do_login(&state, &form).await,
        Some("signup") => do_signup(&state, &form).await,
        _ => flash::redirect_error("/auth/?tab=login", "Invalid action.").into_response(),
    }
}

/// GET /login/
pub async fn login_page(Query(flash): Query<FlashQuery>) -> Redirect {
    Redirect::to(&tab_location(Tab::Login, &flash))
}

/// POST /login/
pub async fn login_submit(State(state): State<Arc<AppState>>, Form(form): Form<AuthForm>) -> Response {
    do_login(&state, &form).await
}

/// GET /signup/
pub async fn signup_page(Query(flash): Query<FlashQuery>) -> Redirect {
    Redirect::to(&tab_location(Tab::Signup, &flash))
}

/// POST /signup/
pub async fn signup_submit(State(state): State<Arc<AppState>>, Form(form): Form<AuthForm>) -> Response {
    do_signup(&state, &form).await
}

/// GET|POST /logout/
pub async fn logout(State(state): State<Arc<AppState>>, user: MaybeUser) -> Response {
    if let Some(user) = user.0 {
        if let Err(e) = state.cache.invalidate_session(&user.jti).await {
            warn!("failed to invalidate session for {}: {:?}", user.username, e);
        }
        info!("user {} logged out", user.username);
    }
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        flash::redirect_success("/login/", "You have been logged out successfully."),
    )
        .into_response()
}

/* ---------- PASSWORD RESET ---------- */

#[derive(Serialize)]
pub struct MessagesPage {
    pub messages: Vec<Message>,
}

/// GET /forget-password/
pub async fn forget_password_page(Query(flash): Query<FlashQuery>) -> Json<MessagesPage> {
    Json(MessagesPage { messages: flash.messages() })
}

/// POST /forget-password/
pub async fn forget_password(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ForgetPasswordForm>,
) -> AppResult<Redirect> {
    let Some(email) = form.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) else {
        return Ok(flash::redirect_error("/forget-password/", "Please enter your email address."));
    };
    let Some(user) = User::find_by_email(email, &state.db.pool).await? else {
        return Ok(flash::redirect_error("/forget-password/", "No user found with this email address."));
    };

    let token = auth::make_reset_token(&user, &state.config.jwt.secret, Utc::now());
    let link = format!(
        "{}/reset-password/{}/{}/",
        state.config.app.public_base_url.trim_end_matches('/'),
        auth::encode_uid(user.id),
        token
    );
    state.notifier.password_reset(&user.email, &user.username, &link);

    Ok(flash::redirect_success(
        "/forget-password/",
        &format!("Password reset link has been sent to {email}. Please check your email."),
    ))
}

/// User named by a reset link, if the link is still valid.
async fn reset_target(state: &AppState, uid: &str, token: &str) -> AppResult<Option<User>> {
    let Some(user_id) = auth::decode_uid(uid) else {
        return Ok(None);
    };
    let Some(user) = User::find_by_id(user_id, &state.db.pool).await? else {
        return Ok(None);
    };
    let valid = auth::check_reset_token(
        &user,
        token,
        &state.config.jwt.secret,
        Utc::now(),
        state.config.jwt.password_reset_timeout_seconds,
    );
    Ok(valid.then_some(user))
}

fn invalid_reset_link() -> Response {
    flash::redirect_error("/login/", "Invalid reset link.").into_response()
}

#[derive(Serialize)]
pub struct ResetPasswordPage {
    pub uid: String,
    pub token: String,
    pub messages: Vec<Message>,
}

/// GET /reset-password/{uid}/{token}/
pub async fn reset_password_page(
    State(state): State<Arc<AppState>>,
    Path((uid, token)): Path<(String, String)>,
    Query(flash): Query<FlashQuery>,
) -> AppResult<Response> {
    if reset_target(&state, &uid, &token).await?.is_none() {
        return Ok(invalid_reset_link());
    }
    Ok(Json(ResetPasswordPage { uid, token, messages: flash.messages() }).into_response())
}

/// POST /reset-password/{uid}/{token}/
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Path((uid, token)): Path<(String, String)>,
    Form(form): Form<ResetPasswordForm>,
) -> AppResult<Response> {
    let Some(user) = reset_target(&state, &uid, &token).await? else {
        return Ok(invalid_reset_link());
    };

    let password = match form.new_password() {
        Ok(password) => password,
        Err(e) => {
            let back = format!("/reset-password/{uid}/{token}/");
            return Ok(flash::redirect_error(&back, &e.user_message()).into_response());
        }
    };

    auth::set_password(&state.db.pool, user.id, &password).await?;
    info!("password reset for {}", user.username);

    Ok(flash::redirect_success(
        "/login/",
        "Password reset successfully! You can now login with your new password.",
    )
    .into_response())
}
