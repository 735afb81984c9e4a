//! Persistence seam for the booking flow.
//!
//! The checkout orchestrator and the seat generator only talk to a
//! [`BookingStore`]. Production uses the Postgres implementation on
//! [`crate::database::Database`]; tests plug in an in-memory one.

pub mod postgres;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::future::Future;

use crate::{
    error::AppResult,
    models::{BookingConfirmation, Coupon, Payment, SeatRow, TicketDetails},
};

/// Contact details captured on the checkout form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactDetails {
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

/// Everything needed to persist a booking once the seat is claimed.
#[derive(Debug, Clone)]
pub struct BookingOrder {
    pub ticket_id: i64,
    pub seat_id: i64,
    pub user_id: Option<i64>,
    pub amount: Decimal,
    pub payment_method: String,
    pub contact: ContactDetails,
    pub booked_at: DateTime<Utc>,
}

/// Result of a successful payment capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureReceipt {
    /// Gateway reference (Stripe PaymentIntent id); `None` for local capture.
    pub external_ref: Option<String>,
}

pub trait BookingStore: Send + Sync {
    fn ticket_details(
        &self,
        ticket_id: i64,
    ) -> impl Future<Output = AppResult<Option<TicketDetails>>> + Send;

    /// Exact match on the stored (uppercase) code.
    fn coupon_by_code(&self, code: &str) -> impl Future<Output = AppResult<Option<Coupon>>> + Send;

    fn count_seats(&self, row_id: i64) -> impl Future<Output = AppResult<i64>> + Send;

    /// Inserts one seat per number plus its placeholder ticket at the row price.
    /// Returns the number of seats created.
    fn insert_seats(
        &self,
        row: &SeatRow,
        numbers: &[i32],
    ) -> impl Future<Output = AppResult<u32>> + Send;

    /// Claims the seat, runs `capture`, then attaches the ticket and records a
    /// completed payment. All of it commits together or not at all; a seat
    /// that is already booked fails with `AlreadyBooked` before `capture` runs.
    fn book_ticket<F, Fut>(
        &self,
        order: BookingOrder,
        capture: F,
    ) -> impl Future<Output = AppResult<Payment>> + Send
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = AppResult<CaptureReceipt>> + Send;

    fn booking_confirmation(
        &self,
        payment_id: i64,
    ) -> impl Future<Output = AppResult<Option<BookingConfirmation>>> + Send;
}
