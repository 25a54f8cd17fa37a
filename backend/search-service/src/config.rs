/// Configuration for search-service, read from the environment
use event_bus::EventBusConfig;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub events: EventBusConfig,
    pub idempotency_retention: Duration,
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
        Ok(Self {
            host: env_or("SEARCH_SERVICE_HOST", "0.0.0.0"),
            port: env_parse("SEARCH_SERVICE_PORT", 8086)?,
            database_url: env_or("DATABASE_URL", "postgresql://localhost/nova_search"),
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10)?,
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1:6379"),
            events: EventBusConfig::from_env("search-service"),
            idempotency_retention: Duration::from_secs(
                env_parse("IDEMPOTENCY_RETENTION_HOURS", 168u64)? * 3600,
            ),
        })
    }
}
