//! Postgres-Backed Cache
//!
//! Implements [`CacheStore`] on the UNLOGGED `cache_entries` table. Every
//! operation that must be atomic is a single conditional statement, so
//! concurrent requests for the same key cannot double-admit or
//! double-count.

use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;

use super::{CacheError, CacheResult, CacheStore, Counter};

/// [`CacheStore`] implementation over the shared Postgres pool
#[derive(Clone)]
pub struct PgCacheStore {
    pool: PgPool,
}

impl PgCacheStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend_err(e: sqlx::Error) -> CacheError {
    CacheError::Backend(e.to_string())
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT cache_value FROM cache_entries WHERE cache_key = $1 AND expires_at > now()",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        sqlx::query(
            r"
            INSERT INTO cache_entries (cache_key, cache_value, expires_at)
            VALUES ($1, $2, now() + $3 * interval '1 second')
            ON CONFLICT (cache_key) DO UPDATE SET
                cache_value = EXCLUDED.cache_value,
                expires_at = EXCLUDED.expires_at
            ",
        )
        .bind(key)
        .bind(value)
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool> {
        // A stale (expired) row does not block the conditional set.
        let result = sqlx::query(
            r"
            INSERT INTO cache_entries (cache_key, cache_value, expires_at)
            VALUES ($1, $2, now() + $3 * interval '1 second')
            ON CONFLICT (cache_key) DO UPDATE SET
                cache_value = EXCLUDED.cache_value,
                expires_at = EXCLUDED.expires_at
            WHERE cache_entries.expires_at <= now()
            ",
        )
        .bind(key)
        .bind(value)
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        sqlx::query("DELETE FROM cache_entries WHERE cache_key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;

        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> CacheResult<Counter> {
        let (count, remaining_seconds) = sqlx::query_as::<_, (i64, i64)>(
            r"
            INSERT INTO cache_entries (cache_key, cache_value, expires_at)
            VALUES ($1, '1', now() + $2 * interval '1 second')
            ON CONFLICT (cache_key) DO UPDATE SET
                cache_value = CASE
                    WHEN cache_entries.expires_at <= now() THEN '1'
                    ELSE (cache_entries.cache_value::bigint + 1)::text
                END,
                expires_at = CASE
                    WHEN cache_entries.expires_at <= now()
                        THEN now() + $2 * interval '1 second'
                    ELSE cache_entries.expires_at
                END
            RETURNING
                cache_value::bigint,
                GREATEST(extract(epoch FROM (expires_at - now()))::bigint, 0)
            ",
        )
        .bind(key)
        .bind(ttl.as_secs_f64())
        .fetch_one(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(Counter {
            count,
            remaining: Duration::from_secs(remaining_seconds.max(0) as u64),
        })
    }

    async fn purge_expired(&self) -> CacheResult<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= now()")
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;

        Ok(result.rows_affected())
    }
}
