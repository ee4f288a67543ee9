use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;

use super::{Cache, CacheError, Result};
use crate::config::RedisConfig;

/// Maps Redis errors to CacheError.
pub fn map_redis_error(err: redis::RedisError) -> CacheError {
    if err.is_connection_refusal() || err.is_timeout() || err.is_connection_dropped() {
        CacheError::ConnectionFailed(err.to_string())
    } else {
        CacheError::OperationFailed(err.to_string())
    }
}

/// `redis://[:password@]host[:port]/db` from the discrete settings.
pub fn build_redis_url(config: &RedisConfig) -> Result<String> {
    let mut url = url::Url::parse(&format!("redis://{}", config.host))
        .map_err(|e| CacheError::ConnectionFailed(format!("invalid REDIS_HOST: {}", e)))?;
    if !config.password.is_empty() {
        url.set_password(Some(&config.password))
            .map_err(|_| CacheError::ConnectionFailed("invalid REDIS_PASSWORD".to_string()))?;
    }
    url.set_path(&format!("/{}", config.database));
    Ok(url.to_string())
}

/// Redis backend sharing one multiplexed connection manager.
#[derive(Clone)]
pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
}

impl RedisCache {
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let url = build_redis_url(config)?;
        let client = redis::Client::open(url.as_str()).map_err(map_redis_error)?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;
        Ok(Self { conn })
    }

    /// Shared with the session store.
    pub fn connection(&self) -> redis::aio::ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let result: Option<Vec<u8>> = conn.get(key).await.map_err(map_redis_error)?;
        Ok(result)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await.map_err(map_redis_error)
    }

    /// SCAN MATCH then DEL. A failing SCAN is an error; an empty match set is not.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = {
            let iter = conn
                .scan_match::<_, String>(pattern)
                .await
                .map_err(map_redis_error)?;
            iter.collect().await
        };
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let deleted: u64 = conn.del(keys).await.map_err(map_redis_error)?;
        Ok(deleted)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str, password: &str, database: i64) -> RedisConfig {
        RedisConfig {
            enabled: true,
            host: host.to_string(),
            password: password.to_string(),
            database,
            excluded_paths: vec![],
        }
    }

    #[test]
    fn builds_url_from_parts() {
        assert_eq!(build_redis_url(&config("localhost:6379", "", 0)).unwrap(), "redis://localhost:6379/0");
        assert_eq!(
            build_redis_url(&config("cache.internal:6380", "s3cret", 2)).unwrap(),
            "redis://:s3cret@cache.internal:6380/2"
        );
    }
}
