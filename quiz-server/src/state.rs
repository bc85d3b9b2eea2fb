//! Application state for quiz-server

use std::sync::Arc;

use crate::cache::RedisCache;
use crate::config::{BoxError, Config};
use crate::db::PgStore;
use crate::monitor::ConsistencyMonitor;
use crate::search::{IndexSyncOptions, MeiliIndex};
use crate::services::{ServiceSettings, Services};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Quiz, question, answer, reorder and user services
    pub services: Services,
    /// Drift counters reported on /health
    pub monitor: ConsistencyMonitor,
    /// Environment name reported on /health
    pub environment: String,
}

impl AppState {
    /// Connect every backend and start the index worker.
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let store = PgStore::connect(
            &config.database_url,
            config.db_max_connections,
            config.db_acquire_timeout,
        )
        .await?;
        let cache = RedisCache::connect(&config.redis_url, config.cache_timeout).await?;
        let index = MeiliIndex::connect(&config.meili_url, &config.meili_admin_key).await?;

        let monitor = ConsistencyMonitor::new();
        let settings = ServiceSettings {
            cache_ttl: config.cache_ttl,
            index: IndexSyncOptions {
                max_attempts: config.index_max_attempts,
                retry_backoff: config.index_retry_backoff,
                queue_capacity: config.index_queue_capacity,
            },
        };
        let store = Arc::new(store);
        let (services, _worker) = Services::new(
            store.clone(),
            Arc::new(cache),
            Arc::new(index),
            settings,
            monitor.clone(),
        );

        if config.reindex_on_start {
            services.index.rebuild_all(store.as_ref()).await?;
        }

        Ok(Self::from_services(services, &config.environment))
    }

    /// State over already-wired services.
    pub fn from_services(services: Services, environment: &str) -> Self {
        Self {
            monitor: services.monitor.clone(),
            services,
            environment: environment.to_string(),
        }
    }
}
