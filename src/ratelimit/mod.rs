//! Rate limiting logic and state management.

mod bucket;
mod gate;
mod limiter;
mod response;

pub use bucket::{Bucket, BucketState};
pub use gate::RequestGate;
pub use limiter::RateLimiter;
pub use response::{ResponseMeta, TOO_MANY_REQUESTS};
