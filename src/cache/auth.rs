use redis::AsyncCommands;
use tracing::info;

use crate::cache::CacheService;

fn key(jti: &str) -> String {
    format!("session:{}", jti)
}

impl CacheService {
    /// Records a login session; the JWT carrying `jti` is only honoured while
    /// this key exists.
    pub async fn store_session(&self, jti: &str, user_id: i64, ttl_seconds: u64) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        conn.set_ex(key(jti), user_id, ttl_seconds).await
    }

    pub async fn session_user(&self, jti: &str) -> Result<Option<i64>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        conn.get(key(jti)).await
    }

    /// Logout.
    pub async fn invalidate_session(&self, jti: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let _: () = conn.del(key(jti)).await?;
        info!("Invalidated session {}", jti);
        Ok(())
    }
}
