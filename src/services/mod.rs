pub mod auth;
pub mod checkout;
pub mod coupon;
pub mod payment;
pub mod pricing;
pub mod seats;
