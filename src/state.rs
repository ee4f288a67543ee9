use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{MemorySessionStore, RedisSessionStore, SessionStore, TokenCodec};
use crate::cache::{Cache, MemoryCache, RedisCache};
use crate::config::AppConfig;
use crate::database::models::ENTITIES;
use crate::database::{AccountStore, DatabaseManager, EntityRepository, PgAccountStore, PgRepository};
use crate::middleware::RateLimiter;

/// Dependency handles shared by every layer and handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenCodec>,
    pub sessions: Arc<dyn SessionStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub cache: Arc<dyn Cache>,
    pub limiter: Arc<RateLimiter>,
    pub repositories: Vec<Arc<dyn EntityRepository>>,
    /// Absent when the state is assembled around in-memory stores.
    pub pool: Option<PgPool>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        sessions: Arc<dyn SessionStore>,
        accounts: Arc<dyn AccountStore>,
        cache: Arc<dyn Cache>,
        repositories: Vec<Arc<dyn EntityRepository>>,
    ) -> Self {
        Self {
            tokens: Arc::new(TokenCodec::from_config(&config.auth)),
            limiter: Arc::new(RateLimiter::from_config(&config.limiter)),
            config: Arc::new(config),
            sessions,
            accounts,
            cache,
            repositories,
            pool: None,
        }
    }

    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Connects PostgreSQL and, when enabled, Redis; otherwise falls back to in-process
    /// cache and session stores.
    pub async fn connect(config: AppConfig) -> anyhow::Result<Self> {
        let pool = DatabaseManager::connect(&config.database).await?;

        let (cache, sessions): (Arc<dyn Cache>, Arc<dyn SessionStore>) = if config.redis.enabled {
            let redis = RedisCache::connect(&config.redis).await?;
            let sessions = RedisSessionStore::new(redis.connection(), config.auth.session_max_age_secs);
            tracing::info!(host = %config.redis.host, "connected to redis");
            (Arc::new(redis), Arc::new(sessions))
        } else {
            tracing::info!("redis disabled; using in-memory cache and sessions");
            let ttl = Duration::from_secs(config.auth.session_max_age_secs);
            (Arc::new(MemoryCache::new()), Arc::new(MemorySessionStore::new(ttl)))
        };

        let repositories: Vec<Arc<dyn EntityRepository>> = ENTITIES
            .iter()
            .copied()
            .map(|descriptor| Arc::new(PgRepository::new(descriptor, pool.clone())) as Arc<dyn EntityRepository>)
            .collect();
        let accounts = Arc::new(PgAccountStore::new(pool.clone()));

        Ok(Self::new(config, sessions, accounts, cache, repositories).with_pool(pool))
    }
}
