//! Bounded exponential backoff for stock checks and chat connects.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::random;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

/// Maximum exponent to prevent overflow.
const MAX_EXPONENT: u32 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Stop retrying once this much time has passed since the first attempt.
    pub max_elapsed: Option<Duration>,
    /// Stop retrying after this many attempts (the first one included).
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            multiplier: 1.5,
            max_delay: Duration::from_secs(60),
            max_elapsed: Some(Duration::from_secs(300)),
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based), without jitter.
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = retry.min(MAX_EXPONENT) as i32;
        let scaled = self.initial_delay.as_nanos() as f64 * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_nanos() as f64);
        Duration::from_nanos(capped.max(0.0) as u64)
    }

    /// Base delay plus up to 25% random jitter, still capped at `max_delay`.
    pub fn delay_with_jitter(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        let jitter = base.mul_f64(random::<f64>() * 0.25);
        base.saturating_add(jitter).min(self.max_delay)
    }

    fn exhausted(&self, attempts: u32, elapsed: Duration, next_delay: Duration) -> bool {
        if self.max_attempts.is_some_and(|max| attempts >= max) {
            return true;
        }
        self.max_elapsed.is_some_and(|max| elapsed + next_delay > max)
    }

    /// Start tracking a fresh sequence of attempts.
    pub fn start(&self) -> Backoff<'_> {
        Backoff {
            policy: self,
            started: Instant::now(),
            attempts: 0,
        }
    }
}

/// Attempt bookkeeping for one retried operation.
#[derive(Debug)]
pub struct Backoff<'a> {
    policy: &'a RetryPolicy,
    started: Instant,
    attempts: u32,
}

impl Backoff<'_> {
    /// Record a failed attempt and return how long to wait before the next one, or
    /// `None` when the policy gives up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = self.policy.delay_with_jitter(self.attempts);
        self.attempts += 1;
        if self
            .policy
            .exhausted(self.attempts, self.started.elapsed(), delay)
        {
            None
        } else {
            Some(delay)
        }
    }

    /// Failed attempts recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Run `op` until it succeeds or `policy` gives up, returning the last error.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    op_name: &'static str,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut backoff = policy.start();

    loop {
        match op().await {
            Ok(value) => {
                if backoff.attempts() > 0 {
                    debug!("{} succeeded after {} retries", op_name, backoff.attempts());
                }
                return Ok(value);
            }
            Err(err) => match backoff.next_delay() {
                Some(delay) => {
                    debug!(
                        "{} failed, retrying in {:?} (attempt {}): {}",
                        op_name,
                        delay,
                        backoff.attempts(),
                        err
                    );
                    sleep(delay).await;
                }
                None => {
                    warn!(
                        "{} failed after {} attempts, giving up: {}",
                        op_name,
                        backoff.attempts(),
                        err
                    );
                    return Err(err);
                }
            },
        }
    }
}
