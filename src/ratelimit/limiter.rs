//! Core rate limiter implementation.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::time::{self, Instant};
use tracing::{debug, info, trace, warn};

use super::bucket::Bucket;
use super::response::ResponseMeta;
use crate::config::LimiterConfig;
use crate::error::{GateError, Result};

/// The request gate for one API client.
///
/// Holds one [`Bucket`] per bucket key plus a global lock that suspends all
/// traffic after a global 429. This struct is thread-safe and can be shared
/// across multiple tasks.
#[derive(Debug)]
pub struct RateLimiter {
    /// Buckets indexed by bucket key
    buckets: DashMap<String, Arc<Bucket>>,
    /// All traffic waits until this instant, if set
    global_until: RwLock<Option<Instant>>,
    config: LimiterConfig,
}

impl RateLimiter {
    /// Create a new rate limiter with default settings.
    pub fn new() -> Self {
        Self::with_config(LimiterConfig::default())
    }

    /// Create a new rate limiter with the given configuration.
    pub fn with_config(config: LimiterConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            global_until: RwLock::new(None),
            config,
        }
    }

    /// Get the bucket for a key, creating an empty one if none exists.
    pub fn get(&self, key: &str) -> Arc<Bucket> {
        if let Some(bucket) = self.buckets.get(key) {
            return Arc::clone(bucket.value());
        }

        self.buckets
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!(key = %key, "Creating new bucket");
                Arc::new(Bucket::new())
            })
            .value()
            .clone()
    }

    /// Wait for permission to send one request on `key`.
    ///
    /// Waits out any global lock first, then takes a ticket from the bucket.
    /// Never fails; see [`RateLimiter::take_timeout`] for a bounded wait.
    pub async fn take(&self, key: &str) {
        self.wait_for_global().await;

        trace!(key = %key, "Taking ticket");
        let bucket = self.get(key);
        bucket.take().await;
    }

    /// Like [`RateLimiter::take`], but gives up after `timeout`.
    ///
    /// Abandoning the wait leaves the bucket untouched.
    pub async fn take_timeout(&self, key: &str, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        time::timeout(timeout, self.take(key)).await.map_err(|_| {
            let waited = started.elapsed();
            warn!(
                key = %key,
                waited_ms = waited.as_millis() as u64,
                "Gave up waiting for a ticket"
            );
            GateError::Timeout {
                key: key.to_string(),
                waited,
            }
        })
    }

    async fn wait_for_global(&self) {
        // Loop: the lock may be extended while we sleep
        loop {
            let until = *self.global_until.read();
            match until {
                Some(until) if until > Instant::now() => {
                    debug!(
                        wait_ms = (until - Instant::now()).as_millis() as u64,
                        "Global rate limit active, waiting"
                    );
                    time::sleep_until(until).await;
                }
                _ => return,
            }
        }
    }

    /// Absorb quota information from a response on `key`.
    ///
    /// Returns how long the server asked us to back off when the response is a
    /// 429, `None` otherwise. A global 429 also suspends every key until the
    /// back-off has passed. Retrying the request is left to the caller.
    pub fn ingest(&self, key: &str, meta: &ResponseMeta) -> Option<Duration> {
        let bucket = self.get(key);
        bucket.update(meta.limit, meta.remaining, meta.reset);

        trace!(
            key = %key,
            status = meta.status,
            limit = ?meta.limit,
            remaining = ?meta.remaining,
            "Ingested response"
        );

        if !meta.is_rate_limited() {
            return None;
        }

        let retry_after = match meta.retry_after {
            Some(retry_after) => retry_after,
            None => match self.config.fallback_retry_after() {
                Some(fallback) => {
                    warn!(
                        key = %key,
                        fallback_ms = fallback.as_millis() as u64,
                        "Rate limited without usable Retry-After, using fallback"
                    );
                    fallback
                }
                None => {
                    warn!(key = %key, "Rate limited without usable Retry-After");
                    return None;
                }
            },
        };

        if meta.global {
            self.arm_global(retry_after);
            warn!(
                key = %key,
                retry_after_ms = retry_after.as_millis() as u64,
                "Global rate limit hit, suspending all requests"
            );
        } else {
            info!(
                key = %key,
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit hit"
            );
        }

        Some(retry_after)
    }

    /// Only ever moves the global lock later.
    fn arm_global(&self, retry_after: Duration) {
        let Some(until) = Instant::now().checked_add(retry_after) else {
            return;
        };

        let mut global = self.global_until.write();
        if global.map_or(true, |current| until > current) {
            *global = Some(until);
        }
    }

    /// When the global lock lifts, if one was ever armed.
    pub fn global_until(&self) -> Option<Instant> {
        *self.global_until.read()
    }

    /// Whether traffic is currently suspended by the global lock.
    pub fn is_globally_limited(&self) -> bool {
        self.global_until()
            .map_or(false, |until| until > Instant::now())
    }

    /// Get the number of known buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
