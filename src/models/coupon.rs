use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Coupon {
    pub id: i64,
    pub code: String,
    /// e.g. 10 for 10% off
    pub discount_percent: i32,
    pub valid_until: DateTime<Utc>,
}

impl Coupon {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until > now
    }
}
