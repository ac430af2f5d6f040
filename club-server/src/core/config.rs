use std::path::PathBuf;
use std::time::Duration;

use crate::auth::JwtConfig;
use crate::db::DEFAULT_MAX_ATTEMPTS;

/// Server configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | ./data | Data and log directory |
/// | HTTP_PORT | 3000 | HTTP API port |
/// | ENVIRONMENT | development | development, staging or production |
/// | LOG_LEVEL | info | Default tracing filter |
/// | LOG_JSON | false | JSON formatted console logs |
/// | STORE_PATH | `{WORK_DIR}/club.redb` | Document store file |
/// | TXN_MAX_ATTEMPTS | 5 | Transaction attempts before contention error |
/// | PROFILE_CACHE_TTL_SECS | 300 | Resolved profile cache lifetime |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | Grace period for in-flight requests |
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    pub http_port: u16,
    pub environment: String,
    pub log_level: String,
    pub log_json: bool,
    pub store_path: Option<String>,
    pub txn_max_attempts: u32,
    pub profile_cache_ttl_secs: u64,
    pub shutdown_timeout_ms: u64,
    pub jwt: JwtConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            http_port: env_or("HTTP_PORT", 3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_or("LOG_JSON", false),
            store_path: std::env::var("STORE_PATH").ok(),
            txn_max_attempts: env_or("TXN_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS).max(1),
            profile_cache_ttl_secs: env_or("PROFILE_CACHE_TTL_SECS", 300),
            shutdown_timeout_ms: env_or("SHUTDOWN_TIMEOUT_MS", 10_000),
            jwt: JwtConfig::default(),
        }
    }

    /// Override the directories, mostly for tests
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config.store_path = None;
        config
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&self.work_dir).join("club.redb"))
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    pub fn profile_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.profile_cache_ttl_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
