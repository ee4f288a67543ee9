use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store error: {0}")]
    Store(String),
}

impl From<redis::RedisError> for SessionError {
    fn from(err: redis::RedisError) -> Self {
        SessionError::Store(err.to_string())
    }
}

/// Server-side half of the session binding: session id -> access token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<String>, SessionError>;

    async fn put(&self, session_id: &str, token: &str) -> Result<(), SessionError>;

    async fn remove(&self, session_id: &str) -> Result<(), SessionError>;
}

/// Process-local sessions, used when Redis is disabled and in tests.
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, (String, Instant)>>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: RwLock::new(HashMap::new()), ttl }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<String>, SessionError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(session_id)
            .filter(|(_, stored_at)| stored_at.elapsed() <= self.ttl)
            .map(|(token, _)| token.clone()))
    }

    async fn put(&self, session_id: &str, token: &str) -> Result<(), SessionError> {
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, stored_at)| stored_at.elapsed() <= self.ttl);
        entries.insert(session_id.to_string(), (token.to_string(), Instant::now()));
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<(), SessionError> {
        self.entries.write().await.remove(session_id);
        Ok(())
    }
}

pub struct RedisSessionStore {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub fn new(conn: ConnectionManager, ttl_secs: u64) -> Self {
        Self { conn, ttl_secs }
    }

    fn key(session_id: &str) -> String {
        format!("session:{}", session_id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<String>, SessionError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(Self::key(session_id)).await?)
    }

    async fn put(&self, session_id: &str, token: &str) -> Result<(), SessionError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(Self::key(session_id), token, self.ttl_secs).await?;
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<(), SessionError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::key(session_id)).await?;
        Ok(())
    }
}
