use redis::AsyncCommands;
use tracing::debug;
use uuid::Uuid;

use crate::cache::{decode_error, CacheService};
use crate::services::checkout::CheckoutSession;

fn key(token: &Uuid) -> String {
    format!("checkout:{}", token)
}

impl CacheService {
    /// Stores (or refreshes) a pending checkout under its token.
    pub async fn save_checkout(&self, session: &CheckoutSession) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(session).map_err(|_| decode_error("Serialize error"))?;
        let mut conn = self.redis.conn.clone();
        let _: () = conn.set_ex(key(&session.token), data, self.checkout_ttl_seconds).await?;
        debug!("checkout session {} saved for ticket {}", session.token, session.ticket_id);
        Ok(())
    }

    /// `None` once the session expired or was consumed.
    pub async fn load_checkout(&self, token: &str) -> Result<Option<CheckoutSession>, redis::RedisError> {
        let Ok(token) = Uuid::parse_str(token.trim()) else {
            return Ok(None);
        };
        let mut conn = self.redis.conn.clone();
        let data: Option<String> = conn.get(key(&token)).await?;
        match data {
            Some(data) => serde_json::from_str(&data)
                .map(Some)
                .map_err(|_| decode_error("Parse error")),
            None => Ok(None),
        }
    }

    pub async fn remove_checkout(&self, token: &Uuid) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let _: () = conn.del(key(token)).await?;
        Ok(())
    }
}
