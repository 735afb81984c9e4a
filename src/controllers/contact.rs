use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::{
    error::{AppError, AppResult},
    flash::{self, FlashQuery, Message},
    forms::{validate_contact_form, ContactForm},
    models::ContactMessage,
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/contact/", get(contact_page).post(submit_contact))
}

#[derive(Serialize)]
pub struct ContactPage {
    pub messages: Vec<Message>,
}

/// GET /contact/
pub async fn contact_page(Query(flash): Query<FlashQuery>) -> Json<ContactPage> {
    Json(ContactPage { messages: flash.messages() })
}

/// POST /contact/
pub async fn submit_contact(State(state): State<Arc<AppState>>, Form(form): Form<ContactForm>) -> AppResult<Response> {
    let form = match validate_contact_form(&form) {
        Ok(form) => form,
        Err(AppError::Validation(errors)) => {
            let text = errors.first_message().unwrap_or("Please correct the errors below.").to_string();
            return Ok(flash::redirect_error("/contact/", &text).into_response());
        }
        Err(e) => return Err(e),
    };

    let saved = ContactMessage::create(&form, &state.db.pool).await?;
    info!("contact message {} from {}", saved.id, saved.email);

    state
        .notifier
        .contact_received(&saved.name, &saved.email, &saved.subject, &saved.message);

    Ok(flash::redirect_success(
        "/contact/",
        "Thank you for contacting us. We will get back to you soon.",
    )
    .into_response())
}
