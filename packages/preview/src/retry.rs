// ABOUTME: Bounded polling of an async probe until it succeeds or a deadline passes
// ABOUTME: Timeout is a normal outcome (None); only fatal probe failures become errors

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Pause between attempts on the readiness path
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(80);

/// Fixed time budget measured from the moment it was started.
///
/// A deadline never moves once started; waiting longer requires a new one.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_exhausted(&self) -> bool {
        self.elapsed() >= self.budget
    }

    /// Elapsed share of the budget, clamped to `[0, 1]`
    pub fn fraction(&self) -> f64 {
        if self.budget.is_zero() {
            return 1.0;
        }
        (self.elapsed().as_secs_f64() / self.budget.as_secs_f64()).min(1.0)
    }
}

/// Why a single probe attempt did not produce a value
#[derive(Debug)]
pub enum ProbeFailure<E> {
    /// Not ready yet; try again after the poll interval
    Retry(E),
    /// Unexpected failure; stop polling and hand the error to the caller
    Fatal(E),
}

/// Invoke `probe` every `interval` until it succeeds or `timeout` has elapsed.
///
/// Returns `Ok(Some(value))` on the first success and `Ok(None)` once the deadline
/// is exhausted. A `ProbeFailure::Fatal` ends the loop with `Err`.
///
/// The deadline is only checked between attempts: an attempt that never resolves
/// keeps this future pending past `timeout`. Probes that can hang must bound
/// themselves (the TCP reachability probe carries its own connect timeout).
pub async fn retry_until<T, E, F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<Option<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProbeFailure<E>>>,
    E: std::fmt::Display,
{
    let deadline = Deadline::start(timeout);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match probe().await {
            Ok(value) => return Ok(Some(value)),
            Err(ProbeFailure::Fatal(e)) => return Err(e),
            Err(ProbeFailure::Retry(e)) => {
                if deadline.is_exhausted() {
                    debug!(
                        "Giving up after {} attempts in {:?}: {}",
                        attempt,
                        deadline.elapsed(),
                        e
                    );
                    return Ok(None);
                }
                debug!("Attempt {} not ready yet: {}", attempt, e);
            }
        }
        sleep(interval).await;
    }
}
