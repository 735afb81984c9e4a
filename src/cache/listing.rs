use redis::AsyncCommands;

use crate::cache::CacheService;

const GENERATION_KEY: &str = "events:generation";

fn key(generation: u64, filter_key: &str) -> String {
    format!("events:v{}:{}", generation, filter_key)
}

impl CacheService {
    /// Current listing generation. Read it once per request, before the
    /// catalog query, and pass it to both the lookup and the store so a
    /// listing built before an invalidation is never filed under the new one.
    pub async fn listing_generation(&self) -> Result<u64, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let generation: Option<u64> = conn.get(GENERATION_KEY).await?;
        Ok(generation.unwrap_or_default())
    }

    /// Cached event listing JSON for a normalized filter key.
    pub async fn cached_event_listing(
        &self,
        generation: u64,
        filter_key: &str,
    ) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        conn.get(key(generation, filter_key)).await
    }

    pub async fn cache_event_listing(
        &self,
        generation: u64,
        filter_key: &str,
        json: &str,
        ttl_seconds: u64,
    ) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        conn.set_ex(key(generation, filter_key), json, ttl_seconds).await
    }

    /// Orphans every cached listing; old entries age out on their TTL.
    pub async fn invalidate_event_listings(&self) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let _: u64 = conn.incr(GENERATION_KEY, 1u64).await?;
        Ok(())
    }
}
