//! Response cache backends.
//!
//! Keys are request paths; values are serialized response envelopes. Entries never expire
//! on their own and are removed by prefix pattern after writes.

pub mod memory;
pub mod redis_impl;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryCache;
pub use redis_impl::RedisCache;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores without expiry.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Removes every key matching a `*` glob. Zero matches is success.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64>;

    async fn ping(&self) -> Result<()>;
}

/// Glob match where `*` spans any run of characters, including none.
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    let mut segments = pattern.split('*');
    let Some(head) = segments.next() else {
        return key.is_empty();
    };
    let Some(mut remaining) = key.strip_prefix(head) else {
        return false;
    };
    let rest: Vec<&str> = segments.collect();
    let Some((tail, middle)) = rest.split_last() else {
        // No wildcard at all.
        return remaining.is_empty();
    };
    for segment in middle {
        match remaining.find(segment) {
            Some(pos) => remaining = &remaining[pos + segment.len()..],
            None => return false,
        }
    }
    remaining.len() >= tail.len() && remaining.ends_with(tail)
}
