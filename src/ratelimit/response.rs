//! Quota metadata carried by API responses.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::debug;

use crate::config::{HeaderConfig, RetryAfterUnit};

/// HTTP status the server answers with when quota is exhausted.
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Rate limit information observed on a single response.
///
/// Every quota field is optional: a response only overwrites what it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMeta {
    /// HTTP status code
    pub status: u16,
    /// Total tickets per window
    pub limit: Option<u64>,
    /// Tickets left in the current window
    pub remaining: Option<u64>,
    /// When the current window ends
    pub reset: Option<Instant>,
    /// How long the server asks us to back off
    pub retry_after: Option<Duration>,
    /// Whether the limit hit applies to all traffic of this client
    pub global: bool,
}

impl ResponseMeta {
    /// Metadata for a response that carried no quota headers.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            limit: None,
            remaining: None,
            reset: None,
            retry_after: None,
            global: false,
        }
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_remaining(mut self, remaining: u64) -> Self {
        self.remaining = Some(remaining);
        self
    }

    pub fn with_reset(mut self, reset: Instant) -> Self {
        self.reset = Some(reset);
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn with_global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    /// Whether the server rejected the request for exceeding quota.
    pub fn is_rate_limited(&self) -> bool {
        self.status == TOO_MANY_REQUESTS
    }

    /// Extract metadata from raw response headers.
    ///
    /// Header names are matched case-insensitively and the first occurrence of
    /// a repeated header wins. Values that do not parse are dropped.
    pub fn from_headers<'a, I>(status: u16, headers: I, names: &HeaderConfig) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self::from_headers_at(status, headers, names, Utc::now(), Instant::now())
    }

    /// Same as [`ResponseMeta::from_headers`] with an explicit clock pair, used to
    /// map the server's wall-clock reset onto our monotonic clock.
    pub fn from_headers_at<'a, I>(
        status: u16,
        headers: I,
        names: &HeaderConfig,
        wall_now: DateTime<Utc>,
        now: Instant,
    ) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut raw = RawHeaders::default();
        for (name, value) in headers {
            if name.eq_ignore_ascii_case(&names.limit) {
                first(&mut raw.limit, value);
            } else if name.eq_ignore_ascii_case(&names.remaining) {
                first(&mut raw.remaining, value);
            } else if name.eq_ignore_ascii_case(&names.reset) {
                first(&mut raw.reset, value);
            } else if name.eq_ignore_ascii_case(&names.retry_after) {
                first(&mut raw.retry_after, value);
            } else if name.eq_ignore_ascii_case(&names.global) {
                first(&mut raw.global, value);
            }
        }

        Self {
            status,
            limit: raw.limit.and_then(|v| logged(&names.limit, v, parse_count(v))),
            remaining: raw
                .remaining
                .and_then(|v| logged(&names.remaining, v, parse_count(v))),
            reset: raw
                .reset
                .and_then(|v| logged(&names.reset, v, parse_reset(v, wall_now, now))),
            retry_after: raw.retry_after.and_then(|v| {
                logged(
                    &names.retry_after,
                    v,
                    parse_retry_after(v, names.retry_after_unit),
                )
            }),
            global: raw.global.map(parse_flag).unwrap_or(false),
        }
    }
}

#[derive(Default)]
struct RawHeaders<'a> {
    limit: Option<&'a str>,
    remaining: Option<&'a str>,
    reset: Option<&'a str>,
    retry_after: Option<&'a str>,
    global: Option<&'a str>,
}

fn first<'a>(slot: &mut Option<&'a str>, value: &'a str) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

fn logged<T>(header: &str, value: &str, parsed: Option<T>) -> Option<T> {
    if parsed.is_none() {
        debug!(header = %header, value = %value, "Ignoring malformed rate limit header");
    }
    parsed
}

fn parse_count(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

/// Parse an epoch-seconds reset (fractions allowed) into a monotonic instant.
///
/// A reset that is already in the past maps to `now`.
fn parse_reset(value: &str, wall_now: DateTime<Utc>, now: Instant) -> Option<Instant> {
    let secs: f64 = value.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }

    let reset_ms = (secs * 1000.0).round() as i64;
    let delta_ms = reset_ms.saturating_sub(wall_now.timestamp_millis());
    if delta_ms <= 0 {
        return Some(now);
    }
    now.checked_add(Duration::from_millis(delta_ms as u64))
}

/// Zero is treated like a missing header.
fn parse_retry_after(value: &str, unit: RetryAfterUnit) -> Option<Duration> {
    let raw: f64 = value.trim().parse().ok()?;
    unit.to_duration(raw).filter(|d| !d.is_zero())
}

fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("true") || value == "1" || value.eq_ignore_ascii_case("yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall(secs: i64, millis: u32) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, millis * 1_000_000).unwrap()
    }

    fn parse(status: u16, headers: &[(&str, &str)]) -> (ResponseMeta, Instant) {
        let now = Instant::now();
        let meta = ResponseMeta::from_headers_at(
            status,
            headers.iter().copied(),
            &HeaderConfig::default(),
            wall(1_700_000_000, 0),
            now,
        );
        (meta, now)
    }

    #[test]
    fn test_parses_quota_headers() {
        let (meta, now) = parse(
            200,
            &[
                ("X-RateLimit-Limit", "5"),
                ("X-RateLimit-Remaining", "0"),
                ("X-RateLimit-Reset", "1700000002.5"),
            ],
        );

        assert_eq!(meta.status, 200);
        assert_eq!(meta.limit, Some(5));
        assert_eq!(meta.remaining, Some(0));
        assert_eq!(meta.reset, Some(now + Duration::from_millis(2500)));
        assert!(!meta.is_rate_limited());
    }

    #[test]
    fn test_header_names_are_case_insensitive() {
        let (meta, _) = parse(
            200,
            &[("x-ratelimit-limit", "10"), ("X-RATELIMIT-REMAINING", "9")],
        );

        assert_eq!(meta.limit, Some(10));
        assert_eq!(meta.remaining, Some(9));
    }

    #[test]
    fn test_first_repeated_header_wins() {
        let (meta, _) = parse(429, &[("Retry-After", "1500"), ("Retry-After", "9000")]);
        assert_eq!(meta.retry_after, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_malformed_values_are_dropped() {
        let (meta, _) = parse(
            200,
            &[
                ("X-RateLimit-Limit", "five"),
                ("X-RateLimit-Remaining", "-1"),
                ("X-RateLimit-Reset", "soon"),
            ],
        );

        assert_eq!(meta, ResponseMeta::new(200));
    }

    #[test]
    fn test_reset_in_the_past_maps_to_now() {
        let (meta, now) = parse(200, &[("X-RateLimit-Reset", "1600000000")]);
        assert_eq!(meta.reset, Some(now));
    }

    #[test]
    fn test_retry_after_and_global() {
        let (meta, _) = parse(
            429,
            &[("Retry-After", " 1500 "), ("X-RateLimit-Global", "true")],
        );

        assert!(meta.is_rate_limited());
        assert_eq!(meta.retry_after, Some(Duration::from_millis(1500)));
        assert!(meta.global);
    }

    #[test]
    fn test_retry_after_zero_or_garbage_is_absent() {
        let (meta, _) = parse(429, &[("Retry-After", "0")]);
        assert_eq!(meta.retry_after, None);

        let (meta, _) = parse(429, &[("Retry-After", "later")]);
        assert_eq!(meta.retry_after, None);
    }

    #[test]
    fn test_retry_after_in_seconds() {
        let names = HeaderConfig {
            retry_after_unit: RetryAfterUnit::Seconds,
            ..Default::default()
        };
        let meta = ResponseMeta::from_headers_at(
            429,
            [("Retry-After", "2")],
            &names,
            wall(1_700_000_000, 0),
            Instant::now(),
        );

        assert_eq!(meta.retry_after, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_global_flag_values() {
        let cases = [
            ("true", true),
            ("1", true),
            ("YES", true),
            ("false", false),
            ("", false),
        ];
        for (value, expected) in cases {
            let (meta, _) = parse(429, &[("X-RateLimit-Global", value)]);
            assert_eq!(meta.global, expected, "value {:?}", value);
        }
    }

    #[test]
    fn test_custom_header_names() {
        let names = HeaderConfig {
            remaining: "RateLimit-Remaining".to_string(),
            ..Default::default()
        };
        let meta = ResponseMeta::from_headers_at(
            200,
            [("ratelimit-remaining", "3"), ("X-RateLimit-Remaining", "7")],
            &names,
            wall(1_700_000_000, 0),
            Instant::now(),
        );

        assert_eq!(meta.remaining, Some(3));
    }

    #[test]
    fn test_builder() {
        let meta = ResponseMeta::new(429)
            .with_retry_after(Duration::from_millis(1500))
            .with_global(true)
            .with_remaining(0);

        assert!(meta.is_rate_limited());
        assert!(meta.global);
        assert_eq!(meta.remaining, Some(0));
        assert_eq!(meta.limit, None);
    }

    #[test]
    fn test_from_headers_uses_live_clock() {
        let reset = (Utc::now() + chrono::Duration::seconds(30)).timestamp();
        let reset = reset.to_string();
        let meta = ResponseMeta::from_headers(
            200,
            [("X-RateLimit-Remaining", "3"), ("X-RateLimit-Reset", reset.as_str())],
            &HeaderConfig::default(),
        );

        assert_eq!(meta.remaining, Some(3));
        let wait = meta.reset.expect("reset parsed") - Instant::now();
        assert!(wait > Duration::from_secs(25) && wait <= Duration::from_secs(30));
    }
}
