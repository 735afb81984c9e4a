use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;

// Top-level settings, one section per concern
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub payment: PaymentConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub checkout: CheckoutConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
    /// Used to build absolute links (password reset).
    pub public_base_url: String,
    pub event_list_cache_ttl_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Plain,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub acquire_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in_hours: i64,
    pub password_reset_timeout_seconds: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Local,
    Stripe,
}

// Payment gateway selection and Stripe credentials
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub provider: PaymentProvider,
    pub currency: String,
    pub stripe_secret_key: Option<String>,
    pub stripe_api_base: String,
    pub request_timeout_seconds: u64,
}

// Circuit breaker around the Stripe API
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutConfig {
    pub tax_rate: Decimal,
    pub session_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub default_from_email: String,
    pub contact_receiver_email: String,
}

type Builder = config::builder::ConfigBuilder<config::builder::DefaultState>;

/// Defaults first, then the flat variables the deployment sets.
fn layered(var: impl Fn(&str) -> Option<String>) -> Result<Builder, config::ConfigError> {
    config::Config::builder()
        .set_default("app.host", "0.0.0.0")?
        .set_default("app.port", 8000)?
        .set_default("app.environment", "development")?
        .set_default("app.rust_log", "seatscape=debug,tower_http=debug")?
        .set_default("app.log_format", "plain")?
        .set_default("app.public_base_url", "http://localhost:8000")?
        .set_default("app.event_list_cache_ttl_seconds", 60)?
        .set_default("database.pool_size", 20)?
        .set_default("database.acquire_timeout_seconds", 5)?
        .set_default("jwt.expires_in_hours", 24)?
        .set_default("jwt.password_reset_timeout_seconds", 120)?
        .set_default("payment.provider", "local")?
        .set_default("payment.currency", "usd")?
        .set_default("payment.stripe_api_base", "https://api.stripe.com")?
        .set_default("payment.request_timeout_seconds", 30)?
        .set_default("circuit_breaker.failure_threshold", 5)?
        .set_default("circuit_breaker.timeout_seconds", 60)?
        .set_default("checkout.tax_rate", "0.15")?
        .set_default("checkout.session_ttl_seconds", 900)?
        .set_default("mail.default_from_email", "noreply@seatscape.local")?
        .set_default("mail.contact_receiver_email", "support@seatscape.local")?
        .set_override_option("app.host", var("HOST"))?
        .set_override_option("app.port", var("PORT"))?
        .set_override_option("app.environment", var("ENVIRONMENT"))?
        .set_override_option("app.rust_log", var("RUST_LOG"))?
        .set_override_option("app.log_format", var("LOG_FORMAT"))?
        .set_override_option("app.public_base_url", var("PUBLIC_BASE_URL"))?
        .set_override_option(
            "app.event_list_cache_ttl_seconds",
            var("EVENT_LIST_CACHE_TTL_SECONDS"),
        )?
        .set_override_option("database.url", var("DATABASE_URL"))?
        .set_override_option("database.pool_size", var("DB_POOL_SIZE"))?
        .set_override_option(
            "database.acquire_timeout_seconds",
            var("DB_ACQUIRE_TIMEOUT_SECONDS"),
        )?
        .set_override_option("redis.url", var("REDIS_URL"))?
        .set_override_option("jwt.secret", var("JWT_SECRET"))?
        .set_override_option("jwt.expires_in_hours", var("JWT_EXPIRES_IN_HOURS"))?
        .set_override_option(
            "jwt.password_reset_timeout_seconds",
            var("PASSWORD_RESET_TIMEOUT_SECONDS"),
        )?
        .set_override_option("payment.provider", var("PAYMENT_PROVIDER"))?
        .set_override_option("payment.currency", var("PAYMENT_CURRENCY"))?
        .set_override_option("payment.stripe_secret_key", var("STRIPE_SECRET_KEY"))?
        .set_override_option("payment.stripe_api_base", var("STRIPE_API_BASE"))?
        .set_override_option(
            "payment.request_timeout_seconds",
            var("PAYMENT_REQUEST_TIMEOUT_SECONDS"),
        )?
        .set_override_option(
            "circuit_breaker.failure_threshold",
            var("CIRCUIT_BREAKER_FAILURE_THRESHOLD"),
        )?
        .set_override_option(
            "circuit_breaker.timeout_seconds",
            var("CIRCUIT_BREAKER_TIMEOUT_SECONDS"),
        )?
        .set_override_option("checkout.tax_rate", var("CHECKOUT_TAX_RATE"))?
        .set_override_option(
            "checkout.session_ttl_seconds",
            var("CHECKOUT_SESSION_TTL_SECONDS"),
        )?
        .set_override_option("mail.default_from_email", var("DEFAULT_FROM_EMAIL"))?
        .set_override_option(
            "mail.contact_receiver_email",
            var("CONTACT_RECEIVER_EMAIL"),
        )
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, config::ConfigError> {
        layered(var)?.build()?.try_deserialize()
    }
}

impl DatabaseConfig {
    /// Just the database section, for tools that never serve requests.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, config::ConfigError> {
        layered(var)?.build()?.get("database")
    }
}
