//! Checkout orchestration.
//!
//! A ticket moves `Available → Pending → Booked`. `begin` prices the ticket
//! and hands back a [`CheckoutSession`] (the Pending state) that the caller
//! keeps under a server-issued token. `apply_coupon` re-prices the session.
//! `complete` validates the forms and asks the store to claim the seat,
//! capture the payment and write the payment record in one transaction.
//! A capture that outlives a rolled-back transaction is refunded.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    forms::{validate_checkout_form, CheckoutForm},
    models::{BookingConfirmation, Coupon, Payment, TicketDetails},
    services::{
        coupon::validate_coupon,
        payment::{CaptureRequest, PaymentGateway},
        pricing::Pricing,
    },
    store::{BookingOrder, BookingStore, CaptureReceipt},
};

/// Pending checkout state for one ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub token: Uuid,
    pub ticket_id: i64,
    pub pricing: Pricing,
    pub coupon_code: Option<String>,
    pub discount_percent: u32,
    pub created_at: DateTime<Utc>,
}

impl CheckoutSession {
    pub fn new(ticket_id: i64, pricing: Pricing, now: DateTime<Utc>) -> Self {
        Self {
            token: Uuid::new_v4(),
            ticket_id,
            pricing,
            coupon_code: None,
            discount_percent: 0,
            created_at: now,
        }
    }
}

/// Coupon outcome in the shape the AJAX endpoint reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedCoupon {
    pub success: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub discount_percent: u32,
    pub message: String,
}

pub struct CheckoutService<S, G> {
    store: S,
    gateway: G,
    tax_rate: Decimal,
    currency: String,
}

impl<S: BookingStore, G: PaymentGateway> CheckoutService<S, G> {
    pub fn new(store: S, gateway: G, tax_rate: Decimal, currency: impl Into<String>) -> Self {
        Self {
            store,
            gateway,
            tax_rate,
            currency: currency.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    async fn available_ticket(&self, ticket_id: i64) -> AppResult<TicketDetails> {
        let ticket = self
            .store
            .ticket_details(ticket_id)
            .await?
            .ok_or(AppError::NotFound("Ticket"))?;
        if ticket.is_booked {
            return Err(AppError::AlreadyBooked);
        }
        Ok(ticket)
    }

    /// Prices an unbooked ticket and opens a pending session for it.
    pub async fn begin(&self, ticket_id: i64, now: DateTime<Utc>) -> AppResult<(TicketDetails, CheckoutSession)> {
        let ticket = self.available_ticket(ticket_id).await?;
        let pricing = Pricing::compute(ticket.price, 0, self.tax_rate);
        let session = CheckoutSession::new(ticket.ticket_id, pricing, now);
        Ok((ticket, session))
    }

    /// Validates the coupon and re-prices the session in place.
    pub async fn apply_coupon(
        &self,
        session: &mut CheckoutSession,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<AppliedCoupon> {
        let coupon: Coupon = validate_coupon(&self.store, code, now).await?;
        let percent = u32::try_from(coupon.discount_percent.clamp(0, 100)).unwrap_or(0);

        session.pricing = session.pricing.with_discount(percent);
        session.coupon_code = Some(coupon.code.clone());
        session.discount_percent = percent;

        Ok(AppliedCoupon {
            success: true,
            discount_amount: session.pricing.discount_amount,
            total_amount: session.pricing.total_amount,
            discount_percent: percent,
            message: format!("Coupon applied! {percent}% discount added."),
        })
    }

    /// Books the session's ticket. On any error nothing has been written and
    /// any capture already taken has been refunded.
    pub async fn complete(
        &self,
        session: &CheckoutSession,
        ticket_id: i64,
        form: &CheckoutForm,
        user_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> AppResult<Payment> {
        if session.ticket_id != ticket_id {
            return Err(AppError::validation(
                "checkout_token",
                "Your checkout session does not match this ticket. Please start again.",
            ));
        }

        let checked = validate_checkout_form(form)?;
        if self.gateway.requires_payment_token() && checked.payment.stripe_payment_method.is_none() {
            return Err(AppError::validation(
                "stripe_payment_method",
                "Card details are required for Stripe payments.",
            ));
        }

        let ticket = self.available_ticket(ticket_id).await?;
        let pricing = session.pricing;
        let amount_minor = pricing
            .total_minor_units()
            .ok_or_else(|| AppError::Internal(format!("amount out of range: {}", pricing.total_amount)))?;

        let capture = CaptureRequest {
            ticket_id,
            amount_minor,
            currency: self.currency.clone(),
            description: format!(
                "{} - {} seat {}",
                ticket.event_name, ticket.row_name, ticket.seat_number
            ),
            receipt_email: checked.contact.email.clone(),
            method: checked.payment.method,
            stripe_payment_method: checked.payment.stripe_payment_method.clone(),
            idempotency_key: format!(
                "checkout-{}-{}",
                session.token,
                checked
                    .payment
                    .stripe_payment_method
                    .as_deref()
                    .unwrap_or(checked.payment.method.as_str())
            ),
        };
        let card = checked.payment.card.as_ref().map(|c| format!("****{}", c.last4()));

        let order = BookingOrder {
            ticket_id,
            seat_id: ticket.seat_id,
            user_id,
            amount: pricing.total_amount,
            payment_method: checked.payment.method.as_str().to_string(),
            contact: checked.contact,
            booked_at: now,
        };

        let captured = OnceCell::new();
        let result = {
            let gateway = &self.gateway;
            let captured = &captured;
            let request = capture.clone();
            let booking: std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<Payment>> + Send + '_>,
            > = Box::pin(self.store.book_ticket(order, move || async move {
                let receipt = gateway.capture(request).await?;
                let _ = captured.set(receipt.clone());
                Ok::<_, AppError>(receipt)
            }));
            booking.await
        };

        match &result {
            Ok(payment) => info!(
                "ticket {} booked: payment={}, amount={}, coupon={:?}, card={:?}",
                ticket_id, payment.id, payment.amount, session.coupon_code, card
            ),
            Err(e) => {
                warn!("checkout for ticket {} failed: {}", ticket_id, e);
                if let Some(receipt) = captured.get() {
                    self.reverse(receipt, &capture).await;
                }
            }
        }
        result
    }

    async fn reverse(&self, receipt: &CaptureReceipt, capture: &CaptureRequest) {
        match self.gateway.refund(receipt, capture).await {
            Ok(()) => info!(
                "refunded capture {:?} for ticket {}",
                receipt.external_ref, capture.ticket_id
            ),
            Err(e) => error!(
                "refund failed for ticket {} (ref {:?}, amount {} {}): {}",
                capture.ticket_id, receipt.external_ref, capture.amount_minor, capture.currency, e
            ),
        }
    }

    pub async fn confirmation(&self, payment_id: i64) -> AppResult<BookingConfirmation> {
        self.store
            .booking_confirmation(payment_id)
            .await?
            .ok_or(AppError::NotFound("Payment"))
    }
}
