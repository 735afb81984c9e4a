use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    error::{AppError, AppResult},
    flash::{self, FlashQuery, Message},
    forms::{CheckoutForm, CouponForm},
    middleware::MaybeUser,
    models::{BookingConfirmation, TicketDetails},
    services::{checkout::AppliedCoupon, pricing::Pricing},
    store::BookingStore,
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/checkout/{ticket_id}/", get(checkout_page).post(submit_checkout))
        .route("/apply-coupon/", post(apply_coupon))
        .route("/booking-confirmation/{payment_id}/", get(booking_confirmation))
}

/* ---------- helpers ---------- */

/// Event page for the ticket, or the listing when the ticket is gone.
async fn event_page(state: &AppState, ticket_id: i64) -> String {
    match state.checkout.store().ticket_details(ticket_id).await {
        Ok(Some(ticket)) => format!("/{}/", ticket.event_id),
        _ => "/".to_string(),
    }
}

/// Domain failures go back to the event page as a flash message; form and
/// lookup errors are rendered directly.
async fn recover(state: &AppState, ticket_id: i64, err: AppError) -> Response {
    match err {
        AppError::Validation(_) | AppError::NotFound(_) => err.into_response(),
        other => {
            let target = event_page(state, ticket_id).await;
            flash::redirect_error(&target, &other.user_message()).into_response()
        }
    }
}

fn is_ajax(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
}

/* ---------- CHECKOUT ---------- */

#[derive(Serialize)]
pub struct CheckoutPage {
    pub ticket: TicketDetails,
    pub pricing: Pricing,
    pub checkout_token: String,
    pub payment_methods: [&'static str; 3],
    pub messages: Vec<Message>,
}

/// GET /checkout/{ticket_id}/
pub async fn checkout_page(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<i64>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    let (ticket, session) = match state.checkout.begin(ticket_id, Utc::now()).await {
        Ok(begun) => begun,
        Err(e) => return recover(&state, ticket_id, e).await,
    };

    if let Err(e) = state.cache.save_checkout(&session).await {
        return AppError::from(e).into_response();
    }

    Json(CheckoutPage {
        ticket,
        pricing: session.pricing,
        checkout_token: session.token.to_string(),
        payment_methods: ["credit_card", "debit_card", "paypal"],
        messages: flash.messages(),
    })
    .into_response()
}

/// POST /checkout/{ticket_id}/
pub async fn submit_checkout(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<i64>,
    user: MaybeUser,
    Form(form): Form<CheckoutForm>,
) -> Response {
    let session = match state.cache.load_checkout(&form.checkout_token).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            return flash::redirect_error(
                &format!("/checkout/{ticket_id}/"),
                "Your checkout session has expired. Please try again.",
            )
            .into_response()
        }
        Err(e) => return AppError::from(e).into_response(),
    };

    match state
        .checkout
        .complete(&session, ticket_id, &form, user.user_id(), Utc::now())
        .await
    {
        Ok(payment) => {
            if let Err(e) = state.cache.remove_checkout(&session.token).await {
                warn!("failed to drop checkout session {}: {:?}", session.token, e);
            }
            // Listings show per-event availability
            if let Err(e) = state.cache.invalidate_event_listings().await {
                warn!("failed to invalidate event listings: {:?}", e);
            }
            flash::redirect_success(
                &format!("/booking-confirmation/{}/", payment.id),
                "Ticket booked successfully!",
            )
            .into_response()
        }
        Err(e) => {
            // A refunded capture must not be replayed under the same idempotency key
            if !matches!(e, AppError::Validation(_)) {
                if let Err(e) = state.cache.remove_checkout(&session.token).await {
                    warn!("failed to drop checkout session {}: {:?}", session.token, e);
                }
            }
            recover(&state, ticket_id, e).await
        }
    }
}

async fn coupon_for_session(state: &AppState, form: &CouponForm) -> AppResult<AppliedCoupon> {
    let mut session = state.cache.load_checkout(&form.checkout_token).await?.ok_or_else(|| {
        AppError::validation(
            "checkout_token",
            "Your checkout session has expired. Please reload the page.",
        )
    })?;
    let applied = state
        .checkout
        .apply_coupon(&mut session, &form.coupon_code, Utc::now())
        .await?;
    state.cache.save_checkout(&session).await?;
    info!(
        "coupon {} applied to ticket {}",
        session.coupon_code.as_deref().unwrap_or_default(),
        session.ticket_id
    );
    Ok(applied)
}

/// POST /apply-coupon/ (AJAX)
pub async fn apply_coupon(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<CouponForm>,
) -> Response {
    if !is_ajax(&headers) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "Invalid request method." })),
        )
            .into_response();
    }

    let result = coupon_for_session(&state, &form).await;

    match result {
        Ok(applied) => Json(applied).into_response(),
        Err(e) => e.into_response(),
    }
}

/* ---------- CONFIRMATION ---------- */

#[derive(Serialize)]
pub struct ConfirmationPage {
    #[serde(flatten)]
    pub confirmation: BookingConfirmation,
    pub messages: Vec<Message>,
}

/// GET /booking-confirmation/{payment_id}/
pub async fn booking_confirmation(
    State(state): State<Arc<AppState>>,
    Path(payment_id): Path<i64>,
    Query(flash): Query<FlashQuery>,
) -> AppResult<Json<ConfirmationPage>> {
    let confirmation = state.checkout.confirmation(payment_id).await?;
    Ok(Json(ConfirmationPage {
        confirmation,
        messages: flash.messages(),
    }))
}
