//! Abuse Guard
//!
//! Rolling-window admission control for sensitive operations. Each admit
//! call is a single atomic counter increment against the cache, so
//! concurrent requests for the same key cannot double-admit. Counters are
//! advisory: a cache restart resets them, which is acceptable because the
//! guard is defense in depth, not a security boundary on its own.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheStore;
use crate::utils::error::{AppError, AppResult};

/// One admission rule: at most `ceiling` calls per `window` per identifier
#[derive(Debug, Clone, Copy)]
pub struct RateRule {
    /// Namespace for the counter key; identifies the guarded operation
    pub scope: &'static str,
    /// Calls permitted inside the window
    pub ceiling: i64,
    /// Window length; also the counter's TTL
    pub window: Duration,
}

/// Password login attempts per identifier
pub const PASSWORD_LOGIN_RULE: RateRule = RateRule {
    scope: "login_password",
    ceiling: 5,
    window: Duration::from_secs(60),
};

/// Rolling-window rate limiter over the cache collaborator
#[derive(Clone)]
pub struct AbuseGuard {
    cache: Arc<dyn CacheStore>,
}

impl AbuseGuard {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self { cache }
    }

    /// Admit or deny one call for `identifier` under `rule`.
    ///
    /// Denials carry the remaining window TTL as the caller-facing retry
    /// hint. The counter is incremented even on the denied call; the
    /// comparison is against the post-increment value, so the check and
    /// the count are one atomic operation.
    pub async fn admit(&self, identifier: &str, rule: &RateRule) -> AppResult<()> {
        let key = format!("rate:{}:{}", rule.scope, identifier);
        let counter = self.cache.increment(&key, rule.window).await?;

        if counter.count > rule.ceiling {
            return Err(AppError::RateLimited {
                retry_after_seconds: counter.remaining.as_secs().max(1),
            });
        }

        Ok(())
    }
}
