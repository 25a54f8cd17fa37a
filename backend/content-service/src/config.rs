/// Configuration management for Content Service
///
/// Loaded from environment variables (`.env` is read by `main` first).
use event_bus::EventBusConfig;
use resilience::RetryConfig;
use std::time::Duration;
use transactional_outbox::OutboxRelayConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub media: MediaServiceConfig,
    pub events: EventBusConfig,
    pub outbox: OutboxRelayConfig,
    /// Retry policy for multi-statement writes (likes)
    pub transactions: RetryConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct MediaServiceConfig {
    /// Base URL of media-service, e.g. `http://media-service:8082`
    pub base_url: String,
    /// Deadline for the multipart ingest call
    pub upload_timeout: Duration,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| format!("{} has an invalid value: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let defaults = RetryConfig::default();

        Ok(Config {
            app: AppConfig {
                env: env_or("APP_ENV", "development"),
                host: env_or("CONTENT_SERVICE_HOST", "0.0.0.0"),
                port: env_parse("CONTENT_SERVICE_PORT", 8081)?,
            },
            database: DatabaseConfig {
                url: env_or("DATABASE_URL", "postgresql://localhost/nova_content"),
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 20)?,
            },
            cache: CacheConfig {
                url: env_or("REDIS_URL", "redis://127.0.0.1:6379"),
            },
            media: MediaServiceConfig {
                base_url: env_or("MEDIA_SERVICE_URL", "http://127.0.0.1:8082"),
                upload_timeout: Duration::from_millis(env_parse("MEDIA_UPLOAD_TIMEOUT_MS", 30_000)?),
            },
            events: EventBusConfig::from_env("content-service"),
            outbox: OutboxRelayConfig::from_env(),
            transactions: RetryConfig::new(
                env_parse("TX_MAX_RETRIES", defaults.max_retries)?,
                Duration::from_millis(env_parse(
                    "TX_RETRY_DELAY_MS",
                    defaults.retry_delay.as_millis() as u64,
                )?),
            ),
        })
    }
}
