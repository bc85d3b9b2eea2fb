//! Quiz server configuration

use std::time::Duration;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Quiz server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Pool size for the authoritative store
    pub db_max_connections: u32,
    /// Upper bound on waiting for a pooled connection
    pub db_acquire_timeout: Duration,
    /// Redis connection URL (read-model cache)
    pub redis_url: String,
    /// Upper bound on a single cache round trip
    pub cache_timeout: Duration,
    /// Lifetime of a cached read model
    pub cache_ttl: Duration,
    /// Meilisearch base URL
    pub meili_url: String,
    /// Meilisearch admin key
    pub meili_admin_key: String,
    /// Attempts per index task before it is recorded as missed
    pub index_max_attempts: u32,
    /// Delay before the first retry; grows linearly per attempt
    pub index_retry_backoff: Duration,
    /// Bounded capacity of the index sync queue
    pub index_queue_capacity: usize,
    /// Re-index every quiz on startup
    pub reindex_on_start: bool,
    /// HTTP port (health check)
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Parse a numeric env var, falling back to `default` when unset.
    /// A present but malformed value is an error rather than silently ignored.
    fn parse_or<T>(name: &str, default: T) -> Result<T, BoxError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match std::env::var(name) {
            Ok(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse()
                .map_err(|e| format!("{name}={raw:?} is invalid: {e}").into()),
            _ => Ok(default),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let index_max_attempts: u32 = Self::parse_or("INDEX_MAX_ATTEMPTS", 3)?;
        if index_max_attempts < 2 {
            return Err("INDEX_MAX_ATTEMPTS must be at least 2".into());
        }
        let index_queue_capacity: usize = Self::parse_or("INDEX_QUEUE_CAPACITY", 1024)?;
        if index_queue_capacity == 0 {
            return Err("INDEX_QUEUE_CAPACITY must be positive".into());
        }

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            db_max_connections: Self::parse_or("DB_MAX_CONNECTIONS", 10)?,
            db_acquire_timeout: Duration::from_secs(Self::parse_or("DB_ACQUIRE_TIMEOUT_SECS", 5)?),
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            cache_timeout: Duration::from_millis(Self::parse_or("CACHE_TIMEOUT_MS", 500)?),
            cache_ttl: Duration::from_secs(Self::parse_or("CACHE_TTL_SECS", 600)?),
            meili_url: std::env::var("MEILI_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:7700".into()),
            meili_admin_key: Self::require_secret("MEILI_ADMIN_KEY", &environment)?,
            index_max_attempts,
            index_retry_backoff: Duration::from_millis(Self::parse_or(
                "INDEX_RETRY_BACKOFF_MS",
                200,
            )?),
            index_queue_capacity,
            reindex_on_start: Self::parse_or("REINDEX_ON_START", false)?,
            http_port: Self::parse_or("HTTP_PORT", 8080)?,
            environment,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_secret_has_dev_fallback() {
        let val = Config::require_secret("QUIZ_TEST_SECRET_NEVER_SET", "development").unwrap();
        assert_eq!(val, "dev-QUIZ_TEST_SECRET_NEVER_SET-not-for-production");
    }

    #[test]
    fn require_secret_rejects_missing_outside_development() {
        let err = Config::require_secret("QUIZ_TEST_SECRET_NEVER_SET", "production").unwrap_err();
        assert!(err.to_string().contains("must be set in production"));
    }

    #[test]
    fn parse_or_defaults_when_unset() {
        let val: u64 = Config::parse_or("QUIZ_TEST_NUMBER_NEVER_SET", 42).unwrap();
        assert_eq!(val, 42);
    }
}
