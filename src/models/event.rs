use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub name: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub description: Option<String>,
    /// Path of an uploaded image, relative to the media root.
    pub image: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: Option<String>,
}
