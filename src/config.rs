//! Configuration module for feedstore.
//!
//! All configuration comes from environment variables with sensible
//! defaults; `PROJECT_ID` is the only required setting.

use std::str::FromStr;
use std::time::Duration;

use crate::{FeedstoreError, Result};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port number to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (trace / debug / info / warn / error).
    pub level: String,
    /// Optional log file path; console-only when absent.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Sustained request rate per client, in requests per minute.
    pub requests_per_minute: u32,
    /// Burst capacity per client.
    pub burst: u32,
    /// Interval between idle-client eviction passes.
    pub cleanup_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 10,
            burst: 5,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// Cache TTL configuration.
///
/// Feed entries get an adaptive TTL selected between `high_freq_feed_ttl`
/// and `low_freq_feed_ttl` based on the observed update cadence; query
/// results always use `default_items_ttl`.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Baseline TTL for feed parse results.
    pub default_feed_ttl: Duration,
    /// TTL for cached query results.
    pub default_items_ttl: Duration,
    /// TTL for feeds updating at least hourly.
    pub high_freq_feed_ttl: Duration,
    /// TTL for feeds updating at most daily.
    pub low_freq_feed_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_feed_ttl: Duration::from_secs(15 * 60),
            default_items_ttl: Duration::from_secs(30 * 60),
            high_freq_feed_ttl: Duration::from_secs(5 * 60),
            low_freq_feed_ttl: Duration::from_secs(60 * 60),
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of worker tasks.
    pub workers: usize,
    /// Capacity of the job queue (and of the result queue).
    pub queue_capacity: usize,
    /// Whether load-based admission control is enabled.
    pub backpressure_enabled: bool,
    /// Queue load fraction at which submissions are rejected, in [0, 1].
    pub reject_threshold: f64,
    /// Deadline for enqueueing a submitted job.
    pub wait_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            queue_capacity: 50,
            backpressure_enabled: true,
            reject_threshold: 0.8,
            wait_timeout: Duration::from_secs(5),
        }
    }
}

/// CORS configuration with environment-specific origin lists.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Deployment environment name (development / staging / production).
    pub environment: String,
    /// Allowed origins in development.
    pub development_origins: Vec<String>,
    /// Allowed origins in staging.
    pub staging_origins: Vec<String>,
    /// Allowed origins in production.
    pub production_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            development_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://localhost:8080".to_string(),
            ],
            staging_origins: Vec::new(),
            production_origins: Vec::new(),
        }
    }
}

impl CorsConfig {
    /// Allowed origins for the configured environment.
    pub fn allowed_origins(&self) -> &[String] {
        match self.environment.to_lowercase().as_str() {
            "production" | "prod" => &self.production_origins,
            "staging" | "stage" => &self.staging_origins,
            _ => &self.development_origins,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Project identifier; names the datastore database.
    pub project_id: String,
    /// Server settings.
    pub server: ServerConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Rate limiting settings.
    pub rate_limit: RateLimitConfig,
    /// Cache TTL settings.
    pub cache: CacheConfig,
    /// Worker pool settings.
    pub worker: WorkerConfig,
    /// CORS settings.
    pub cors: CorsConfig,
    /// Path to the predefined feed sources file.
    pub sources_path: String,
}

impl Config {
    /// Build the configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            project_id: get_env("PROJECT_ID", ""),
            server: ServerConfig {
                host: get_env("SERVER_HOST", "0.0.0.0"),
                port: get_env_parse("SERVER_PORT", 8080),
            },
            logging: LoggingConfig {
                level: get_env("LOG_LEVEL", "info"),
                file: std::env::var("LOG_FILE").ok().filter(|v| !v.is_empty()),
            },
            rate_limit: RateLimitConfig {
                requests_per_minute: get_env_parse("RATE_LIMIT_RPM", 10),
                burst: get_env_parse("RATE_LIMIT_BURST", 5),
                cleanup_interval: get_env_secs("RATE_LIMIT_CLEANUP_INTERVAL", 60),
            },
            cache: CacheConfig {
                default_feed_ttl: get_env_secs("DEFAULT_FEED_TTL", 15 * 60),
                default_items_ttl: get_env_secs("DEFAULT_ITEMS_TTL", 30 * 60),
                high_freq_feed_ttl: get_env_secs("HIGH_FREQ_FEED_TTL", 5 * 60),
                low_freq_feed_ttl: get_env_secs("LOW_FREQ_FEED_TTL", 60 * 60),
            },
            worker: WorkerConfig {
                workers: get_env_parse("ASYNC_WORKERS", 3),
                queue_capacity: get_env_parse("ASYNC_QUEUE_SIZE", 50),
                backpressure_enabled: get_env_parse("ASYNC_BACKPRESSURE", true),
                reject_threshold: get_env_parse("ASYNC_REJECT_THRESHOLD", 0.8),
                wait_timeout: get_env_secs("ASYNC_WAIT_TIMEOUT", 5),
            },
            cors: CorsConfig {
                environment: get_env("ENVIRONMENT", "development"),
                development_origins: get_env_list(
                    "DEV_CORS_ORIGINS",
                    CorsConfig::default().development_origins,
                ),
                staging_origins: get_env_list("STAGING_CORS_ORIGINS", Vec::new()),
                production_origins: get_env_list("PROD_CORS_ORIGINS", Vec::new()),
            },
            sources_path: get_env("FEED_SOURCES_PATH", "data/feeds.json"),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.project_id.is_empty() {
            return Err(FeedstoreError::Config(
                "PROJECT_ID environment variable is required".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.worker.reject_threshold) {
            return Err(FeedstoreError::Config(format!(
                "ASYNC_REJECT_THRESHOLD must be within [0, 1], got {}",
                self.worker.reject_threshold
            )));
        }
        if self.worker.workers == 0 {
            return Err(FeedstoreError::Config(
                "ASYNC_WORKERS must be at least 1".to_string(),
            ));
        }
        if self.worker.queue_capacity == 0 {
            return Err(FeedstoreError::Config(
                "ASYNC_QUEUE_SIZE must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn get_env(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn get_env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_env_secs(key: &str, default_secs: u64) -> Duration {
    Duration::from_secs(get_env_parse(key, default_secs))
}

fn get_env_list(key: &str, default: Vec<String>) -> Vec<String> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v.split(',').map(|s| s.trim().to_string()).collect(),
        _ => default,
    }
}
