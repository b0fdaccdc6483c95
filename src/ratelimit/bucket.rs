//! Per-route quota bucket.

use parking_lot::Mutex;
use tokio::time::{self, Instant};
use tracing::trace;

/// Quota state of a bucket at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketState {
    /// Maximum tickets per window, as last reported by the server
    pub limit: u64,
    /// Tickets left in the current window
    pub remaining: u64,
    /// When the current window is over
    pub reset: Instant,
}

impl BucketState {
    /// State of a bucket nothing is known about yet.
    ///
    /// One ticket is available so the first request is never held back, and the
    /// window is already over.
    pub fn fresh() -> Self {
        Self {
            limit: 0,
            remaining: 1,
            reset: Instant::now(),
        }
    }
}

/// Outcome of a single check against the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Granted,
    WaitUntil(Instant),
}

/// Quota tracker for one bucket key.
///
/// Takers never hold the lock while they sleep, so responses can be ingested
/// into a bucket that has callers waiting on it.
#[derive(Debug)]
pub struct Bucket {
    state: Mutex<BucketState>,
}

impl Bucket {
    /// Create a bucket with no quota information.
    pub fn new() -> Self {
        Self::with_state(BucketState::fresh())
    }

    /// Create a bucket with explicit quota state.
    pub fn with_state(state: BucketState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> BucketState {
        *self.state.lock()
    }

    /// Overwrite the fields that are present, leaving the rest untouched.
    pub fn update(&self, limit: Option<u64>, remaining: Option<u64>, reset: Option<Instant>) {
        let mut state = self.state.lock();
        if let Some(limit) = limit {
            state.limit = limit;
        }
        if let Some(remaining) = remaining {
            state.remaining = remaining;
        }
        if let Some(reset) = reset {
            state.reset = reset;
        }
    }

    /// Take one ticket, waiting for the window to reset if it is exhausted.
    ///
    /// Waking up does not grant a ticket by itself; every waiter goes back
    /// through the check and takes its ticket in turn.
    pub async fn take(&self) {
        loop {
            match self.try_acquire(Instant::now()) {
                Attempt::Granted => return,
                Attempt::WaitUntil(reset) => {
                    time::sleep_until(reset).await;
                    self.replenish(Instant::now());
                }
            }
        }
    }

    fn try_acquire(&self, now: Instant) -> Attempt {
        let mut state = self.state.lock();

        if state.remaining > 0 {
            state.remaining -= 1;
            trace!(remaining = state.remaining, "Ticket granted");
            return Attempt::Granted;
        }

        if now >= state.reset {
            // Window lapsed without a response refreshing it; this caller
            // uses one ticket of the new window.
            state.remaining = state.limit.saturating_sub(1);
            trace!(
                limit = state.limit,
                remaining = state.remaining,
                "Window lapsed, ticket granted"
            );
            return Attempt::Granted;
        }

        trace!(
            wait_ms = (state.reset - now).as_millis() as u64,
            "Bucket exhausted, waiting for reset"
        );
        Attempt::WaitUntil(state.reset)
    }

    fn replenish(&self, now: Instant) {
        let mut state = self.state.lock();
        // A response may have pushed the reset out while we slept
        if now < state.reset {
            return;
        }
        // Another waiter may already have refilled the window
        if state.remaining == 0 {
            state.remaining = state.limit;
        }
    }
}

impl Default for Bucket {
    fn default() -> Self {
        Self::new()
    }
}
