use crate::redis_client::RedisClient;

pub mod auth;
pub mod checkout;
pub mod listing;

/// Redis-backed short-lived state: checkout sessions, login sessions and
/// cached event listings.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    checkout_ttl_seconds: u64,
}

impl CacheService {
    pub fn new(redis: RedisClient, checkout_ttl_seconds: u64) -> Self {
        Self { redis, checkout_ttl_seconds }
    }
}

pub(crate) fn decode_error(what: &'static str) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, what))
}
