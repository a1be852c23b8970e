//! Cache Collaborator
//!
//! TTL-keyed storage with atomic increment and conditional set, used for
//! rate counters and OTP challenge records. The trait keeps the backend
//! substitutable; the crate ships a Postgres-backed implementation and an
//! in-memory one for tests and local development.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use memory::InMemoryCache;
pub use postgres::PgCacheStore;

/// Cache collaborator errors. Backends map their own failures here; callers
/// treat any of them as infrastructure failures.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Value of a counter after an atomic increment
#[derive(Debug, Clone, Copy)]
pub struct Counter {
    /// Counter value including this increment
    pub count: i64,
    /// Time until the counter's window expires
    pub remaining: Duration,
}

/// Duration-indexed key-value store.
///
/// Implementations must make `increment` and `set_if_absent` atomic with
/// respect to concurrent callers for the same key; the guard and challenge
/// logic rely on that to avoid read-then-write races.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live value; expired entries read as absent
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store a value with a TTL, overwriting any existing entry
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Store a value only if no live entry exists; returns whether it won
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool>;

    /// Remove an entry
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Atomically increment a counter, creating it with the given TTL if
    /// absent or expired. The TTL is fixed at creation; later increments
    /// do not extend the window.
    async fn increment(&self, key: &str, ttl: Duration) -> CacheResult<Counter>;

    /// Drop expired entries; returns the number removed
    async fn purge_expired(&self) -> CacheResult<u64>;
}
