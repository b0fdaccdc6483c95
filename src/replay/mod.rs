//! Replays recorded traffic through a request gate.
//!
//! Every event of a [`Trace`] is scheduled at its offset and run concurrently
//! with the others, so takes queue up behind exhausted buckets and global
//! locks exactly as live requests would.

mod trace;

pub use trace::{HeaderValue, Trace, TraceEvent};

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::config::HeaderConfig;
use crate::ratelimit::{RequestGate, ResponseMeta};

/// What happened to one trace event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The take was granted after waiting `waited_ms`
    Granted {
        key: String,
        at_ms: u64,
        waited_ms: u64,
    },
    /// The take gave up at its deadline
    TimedOut {
        key: String,
        at_ms: u64,
        waited_ms: u64,
    },
    /// The response was ingested; `retry_after_ms` is the reported back-off
    Ingested {
        key: String,
        at_ms: u64,
        status: u16,
        retry_after_ms: Option<u64>,
    },
}

/// Outcomes in the same order as the trace events.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplayReport {
    pub outcomes: Vec<Outcome>,
}

impl ReplayReport {
    /// Total time spent waiting across granted takes.
    pub fn total_wait(&self) -> Duration {
        let ms = self
            .outcomes
            .iter()
            .map(|outcome| match outcome {
                Outcome::Granted { waited_ms, .. } => *waited_ms,
                _ => 0,
            })
            .sum();
        Duration::from_millis(ms)
    }

    pub fn timed_out(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, Outcome::TimedOut { .. }))
            .count()
    }
}

/// Options controlling a replay.
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Header names and units used to parse recorded responses
    pub headers: HeaderConfig,
    /// Deadline for each take; unset waits forever
    pub take_timeout: Option<Duration>,
}

/// Run `trace` against `gate` and report what each event saw.
pub async fn replay<G>(gate: &G, trace: &Trace, options: &ReplayOptions) -> ReplayReport
where
    G: RequestGate + ?Sized,
{
    let start = Instant::now();
    let recorded_start = trace.started_at.and_then(epoch_to_datetime);

    info!(events = trace.events.len(), "Starting replay");

    let runs = trace.events.iter().map(|event| async move {
        let due = start + Duration::from_millis(event.at_ms());
        if due > Instant::now() {
            time::sleep_until(due).await;
        }

        match event {
            TraceEvent::Take { key, at_ms } => {
                run_take(gate, key, *at_ms, options.take_timeout).await
            }
            TraceEvent::Response {
                key,
                at_ms,
                status,
                headers,
            } => {
                let wall_now = match recorded_start {
                    Some(recorded) => recorded + chrono_elapsed(start.elapsed()),
                    None => Utc::now(),
                };
                let pairs: Vec<(String, String)> = headers
                    .iter()
                    .flat_map(|(name, value)| {
                        value
                            .values()
                            .into_iter()
                            .map(move |v| (name.clone(), v))
                    })
                    .collect();

                let meta = ResponseMeta::from_headers_at(
                    *status,
                    pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                    &options.headers,
                    wall_now,
                    Instant::now(),
                );
                let retry_after = gate.ingest(key, &meta);

                debug!(
                    key = %key,
                    status = *status,
                    retry_after_ms = ?retry_after.map(|d| d.as_millis() as u64),
                    "Replayed response"
                );

                Outcome::Ingested {
                    key: key.clone(),
                    at_ms: *at_ms,
                    status: *status,
                    retry_after_ms: retry_after.map(|d| d.as_millis() as u64),
                }
            }
        }
    });

    let outcomes = join_all(runs).await;
    let report = ReplayReport { outcomes };

    info!(
        total_wait_ms = report.total_wait().as_millis() as u64,
        timed_out = report.timed_out(),
        "Replay finished"
    );
    report
}

async fn run_take<G>(gate: &G, key: &str, at_ms: u64, timeout: Option<Duration>) -> Outcome
where
    G: RequestGate + ?Sized,
{
    let issued = Instant::now();
    let granted = match timeout {
        Some(timeout) => time::timeout(timeout, gate.take(key)).await.is_ok(),
        None => {
            gate.take(key).await;
            true
        }
    };
    let waited_ms = issued.elapsed().as_millis() as u64;

    if granted {
        debug!(key = %key, at_ms, waited_ms, "Replayed take");
        Outcome::Granted {
            key: key.to_string(),
            at_ms,
            waited_ms,
        }
    } else {
        warn!(key = %key, at_ms, waited_ms, "Replayed take timed out");
        Outcome::TimedOut {
            key: key.to_string(),
            at_ms,
            waited_ms,
        }
    }
}

fn epoch_to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
}

fn chrono_elapsed(elapsed: Duration) -> chrono::Duration {
    chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::zero())
}
