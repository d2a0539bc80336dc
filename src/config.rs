//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::projection::RetryPolicy;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Events per snapshot; 0 disables snapshots
    pub snapshot_interval: u64,

    /// Projection retry policy
    pub projection_max_attempts: u32,
    pub projection_initial_delay: Duration,
    pub projection_max_delay: Duration,
    pub projection_backoff_multiplier: f64,

    /// Time-to-live of cached read models
    pub cache_ttl: Duration,

    /// Convert legacy rows at startup when needed
    pub migrate_on_startup: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").ok_or(ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = parse_or(&lookup, "PORT", 3000)?;

        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        let snapshot_interval = parse_or(&lookup, "SNAPSHOT_INTERVAL", 100)?;

        let projection_max_attempts = parse_or(&lookup, "PROJECTION_MAX_ATTEMPTS", 5)?;
        if projection_max_attempts == 0 {
            return Err(ConfigError::InvalidValue("PROJECTION_MAX_ATTEMPTS"));
        }

        let projection_initial_delay =
            Duration::from_millis(parse_or(&lookup, "PROJECTION_INITIAL_DELAY_MS", 50)?);
        let projection_max_delay =
            Duration::from_millis(parse_or(&lookup, "PROJECTION_MAX_DELAY_MS", 2000)?);

        let projection_backoff_multiplier: f64 =
            parse_or(&lookup, "PROJECTION_BACKOFF_MULTIPLIER", 2.0)?;
        if !projection_backoff_multiplier.is_finite() || projection_backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue("PROJECTION_BACKOFF_MULTIPLIER"));
        }

        let cache_ttl = Duration::from_secs(parse_or(&lookup, "CACHE_TTL_SECS", 300)?);

        let migrate_on_startup = parse_or(&lookup, "MIGRATE_ON_STARTUP", true)?;

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            snapshot_interval,
            projection_max_attempts,
            projection_initial_delay,
            projection_max_delay,
            projection_backoff_multiplier,
            cache_ttl,
            migrate_on_startup,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.projection_max_attempts,
            initial_delay: self.projection_initial_delay,
            max_delay: self.projection_max_delay,
            multiplier: self.projection_backoff_multiplier,
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue(key)),
        None => Ok(default),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
