use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContactMessage {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl ContactMessage {
    pub async fn create(form: &crate::forms::ContactForm, pool: &sqlx::PgPool) -> Result<ContactMessage, sqlx::Error> {
        sqlx::query_as::<_, ContactMessage>(
            r#"
            INSERT INTO contact_messages (name, email, subject, message)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, subject, message, created_at
            "#,
        )
        .bind(&form.name)
        .bind(&form.email)
        .bind(&form.subject)
        .bind(&form.message)
        .fetch_one(pool)
        .await
    }
}
