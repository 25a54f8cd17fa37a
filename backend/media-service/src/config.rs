/// Configuration management for media-service
///
/// Loads configuration from environment variables with development defaults.
use event_bus::EventBusConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub events: EventBusConfig,
    /// How long processed event ids are remembered
    pub idempotency_retention: Duration,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Directory objects are written under
    pub root: PathBuf,
    /// Public URL prefix objects are served from
    pub public_base_url: String,
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
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Config {
            app: AppConfig {
                host: env_or("MEDIA_SERVICE_HOST", "0.0.0.0"),
                port: env_parse("MEDIA_SERVICE_PORT", 8082)?,
                env: env_or("APP_ENV", "development"),
            },
            database: DatabaseConfig {
                url: env_or("DATABASE_URL", "postgresql://localhost/nova_media"),
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            storage: StorageConfig {
                root: PathBuf::from(env_or("MEDIA_STORAGE_DIR", "./media-data")),
                public_base_url: env_or("MEDIA_PUBLIC_BASE_URL", "http://127.0.0.1:8082/files"),
            },
            events: EventBusConfig::from_env("media-service"),
            idempotency_retention: Duration::from_secs(
                env_parse("IDEMPOTENCY_RETENTION_HOURS", 168u64)? * 3600,
            ),
        })
    }
}
