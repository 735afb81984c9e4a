//! One-shot user messages carried across redirects in the query string.

use axum::response::Redirect;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub level: Level,
    pub text: String,
}

/// `?message=` / `?error=` as received on the page the redirect lands on.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlashQuery {
    pub message: Option<String>,
    pub error: Option<String>,
}

impl FlashQuery {
    pub fn messages(&self) -> Vec<Message> {
        let success = self.message.iter().map(|text| Message { level: Level::Success, text: text.clone() });
        let error = self.error.iter().map(|text| Message { level: Level::Error, text: text.clone() });
        success.chain(error).filter(|m| !m.text.is_empty()).collect()
    }
}

fn with_param(path: &str, key: &str, text: &str) -> String {
    let query = serde_urlencoded::to_string([(key, text)]).unwrap_or_default();
    let sep = if path.contains('?') { '&' } else { '?' };
    format!("{path}{sep}{query}")
}

pub fn success_location(path: &str, text: &str) -> String {
    with_param(path, "message", text)
}

pub fn error_location(path: &str, text: &str) -> String {
    with_param(path, "error", text)
}

/// `Redirect::to` answers 303, so a POST lands as a GET.
pub fn redirect_success(path: &str, text: &str) -> Redirect {
    Redirect::to(&success_location(path, text))
}

pub fn redirect_error(path: &str, text: &str) -> Redirect {
    Redirect::to(&error_location(path, text))
}
