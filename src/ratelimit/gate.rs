//! Trait the HTTP dispatcher talks to.

use std::time::Duration;

use async_trait::async_trait;

use super::limiter::RateLimiter;
use super::response::ResponseMeta;

/// A gate deciding when requests may be sent.
///
/// The dispatcher calls [`RequestGate::take`] before writing a request and
/// [`RequestGate::ingest`] with the response metadata afterwards.
#[async_trait]
pub trait RequestGate: Send + Sync {
    /// Wait until a request on `key` may be sent.
    async fn take(&self, key: &str);

    /// Record a response; returns the server's requested back-off on a 429.
    fn ingest(&self, key: &str, meta: &ResponseMeta) -> Option<Duration>;
}

#[async_trait]
impl RequestGate for RateLimiter {
    async fn take(&self, key: &str) {
        RateLimiter::take(self, key).await
    }

    fn ingest(&self, key: &str, meta: &ResponseMeta) -> Option<Duration> {
        RateLimiter::ingest(self, key, meta)
    }
}
