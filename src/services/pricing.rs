//! Checkout arithmetic.
//!
//! ```text
//! tax      = price × tax_rate
//! discount = price × percent / 100
//! total    = price + tax − discount
//! ```
//! Everything is `Decimal`, rounded to cents with banker's rounding.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 15%
pub const DEFAULT_TAX_RATE: Decimal = Decimal::from_parts(15, 0, 0, false, 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
}

impl Pricing {
    pub fn compute(price: Decimal, discount_percent: u32, tax_rate: Decimal) -> Self {
        let subtotal = price.round_dp(2);
        let tax_amount = (subtotal * tax_rate).round_dp(2);
        Self::from_parts(subtotal, tax_amount, discount_percent)
    }

    /// Recomputes discount and total on top of an already computed subtotal
    /// and tax, as coupon application does.
    pub fn from_parts(subtotal: Decimal, tax_amount: Decimal, discount_percent: u32) -> Self {
        let discount_amount = discount_for(subtotal, discount_percent);
        Pricing {
            subtotal,
            tax_amount,
            discount_amount,
            total_amount: subtotal + tax_amount - discount_amount,
        }
    }

    pub fn with_discount(&self, discount_percent: u32) -> Self {
        Self::from_parts(self.subtotal, self.tax_amount, discount_percent)
    }

    /// Total in minor currency units, as card gateways expect it.
    pub fn total_minor_units(&self) -> Option<i64> {
        (self.total_amount.round_dp(2) * Decimal::ONE_HUNDRED)
            .trunc()
            .try_into()
            .ok()
    }
}

pub fn discount_for(subtotal: Decimal, discount_percent: u32) -> Decimal {
    (subtotal * Decimal::from(discount_percent) / Decimal::ONE_HUNDRED).round_dp(2)
}
