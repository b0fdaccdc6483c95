//! Sluice - Client-side request gate for quota-limited HTTP APIs
//!
//! Before each outbound request the caller takes a ticket from the
//! [`ratelimit::RateLimiter`] for the request's bucket key; after the response
//! arrives it hands the response's quota headers back so the limiter knows
//! how much of each window is left. A global 429 suspends every bucket until
//! the server's back-off has passed.

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod replay;
pub mod routing;
