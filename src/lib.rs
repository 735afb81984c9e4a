pub mod cache;
pub mod catalog;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod flash;
pub mod forms;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod redis_client;
pub mod services;
pub mod store;

use std::sync::Arc;
use tracing::info;

use crate::services::{checkout::CheckoutService, payment::Gateway};

// Shared state for every handler
pub struct AppState {
    pub db: database::Database,
    pub cache: cache::CacheService,
    pub config: config::Config,
    pub catalog: catalog::EventCatalog,
    pub checkout: CheckoutService<database::Database, Gateway>,
    pub notifier: notify::Notifier,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::connect(&config.database).await?;
        info!("Database connected");
        db.run_migrations().await?;

        let redis = redis_client::RedisClient::new(&config.redis.url).await?;
        info!("Redis connected");
        let cache = cache::CacheService::new(redis, config.checkout.session_ttl_seconds);

        let gateway = Gateway::from_config(&config.payment, &config.circuit_breaker)?;
        info!("Payment provider: {:?}", config.payment.provider);
        let checkout = CheckoutService::new(
            db.clone(),
            gateway,
            config.checkout.tax_rate,
            config.payment.currency.clone(),
        );

        Ok(Arc::new(Self {
            catalog: catalog::EventCatalog::new(db.pool.clone()),
            notifier: notify::Notifier::new(&config.mail),
            db,
            cache,
            checkout,
            config,
        }))
    }
}
