//! Application error type and its HTTP mapping.
//!
//! Every handler returns `Result<_, AppError>`. Domain failures carry a
//! user-facing message; infrastructure failures are logged and rendered as a
//! generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Field-level form errors, keyed by field name. `__all__` holds form-wide
/// errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormErrors(pub BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub const NON_FIELD: &'static str = "__all__";

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn merge(&mut self, other: FormErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// First message, used when the error is shown as a flash message.
    pub fn first_message(&self) -> Option<&str> {
        self.0.values().flat_map(|m| m.iter()).next().map(String::as_str)
    }
}

impl From<validator::ValidationErrors> for FormErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut out = FormErrors::default();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {field}."));
                out.add(&field, message);
            }
        }
        out
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{}", .0.first_message().unwrap_or("Invalid input."))]
    Validation(FormErrors),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("This ticket is already booked.")]
    AlreadyBooked,

    #[error("Invalid coupon code.")]
    InvalidCoupon,

    #[error("Coupon has expired.")]
    ExpiredCoupon,

    #[error("Payment failed: {0}")]
    PaymentGateway(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation(FormErrors::single(field, message))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyBooked => StatusCode::CONFLICT,
            AppError::InvalidCoupon | AppError::ExpiredCoupon => StatusCode::BAD_REQUEST,
            AppError::PaymentGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to the user.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => {
                "Something went wrong. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a FormErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        let errors = match &self {
            AppError::Validation(errors) => Some(errors),
            _ => None,
        };
        let body = ErrorBody {
            success: false,
            error: self.user_message(),
            errors,
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
