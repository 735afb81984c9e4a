use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SeatRow {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub capacity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub svg_id: Option<String>,
}

/// A ticket joined with everything checkout needs to show and validate it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TicketDetails {
    pub ticket_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub seat_id: i64,
    pub seat_number: i32,
    pub is_booked: bool,
    pub row_id: i64,
    pub row_name: String,
    pub event_id: i64,
    pub event_name: String,
    pub event_date: DateTime<Utc>,
    pub event_location: String,
}
