use redis::{aio::ConnectionManager, Client};

/// Shared Redis handle. `ConnectionManager` reconnects on its own and is cheap
/// to clone per command.
#[derive(Clone)]
pub struct RedisClient {
    pub conn: ConnectionManager,
}

impl RedisClient {
    pub async fn new(redis_url: &str) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(RedisClient { conn })
    }
}
