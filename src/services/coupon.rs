use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::Coupon,
    store::BookingStore,
};

pub const MAX_CODE_LEN: usize = 20;

/// Trims and uppercases a user-entered code. `None` when it can never match.
pub fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_uppercase();
    if code.is_empty() || code.chars().count() > MAX_CODE_LEN {
        return None;
    }
    Some(code)
}

/// A coupon is usable only while `valid_until` is strictly in the future.
pub fn check_coupon(coupon: Option<Coupon>, now: DateTime<Utc>) -> AppResult<Coupon> {
    let coupon = coupon.ok_or(AppError::InvalidCoupon)?;
    if !coupon.is_valid_at(now) {
        return Err(AppError::ExpiredCoupon);
    }
    Ok(coupon)
}

pub async fn validate_coupon<S: BookingStore>(
    store: &S,
    raw_code: &str,
    now: DateTime<Utc>,
) -> AppResult<Coupon> {
    let code = normalize_code(raw_code).ok_or(AppError::InvalidCoupon)?;
    let coupon = store.coupon_by_code(&code).await?;
    check_coupon(coupon, now)
}
