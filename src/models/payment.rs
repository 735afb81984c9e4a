use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Completed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub user_id: Option<i64>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub payment_date: DateTime<Utc>,
    pub status: String,
    pub payment_method: String,
    pub stripe_payment_id: Option<String>,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BookedTicket {
    pub ticket_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub seat_number: i32,
    pub row_name: String,
    pub event_id: i64,
    pub event_name: String,
    pub event_date: DateTime<Utc>,
    pub event_location: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingConfirmation {
    pub payment: Payment,
    pub tickets: Vec<BookedTicket>,
}
