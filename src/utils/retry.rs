//! Retry utilities with linear backoff and jitter for resilient API calls.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::sources::RequestError;

/// Configuration for retry behavior
///
/// The wait before retry `n` (1-based) is `backoff_base * n` plus a uniform
/// jitter drawn from `[jitter_min, jitter_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_jitter_min")]
    pub jitter_min_ms: u64,

    #[serde(default = "default_jitter_max")]
    pub jitter_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            jitter_min_ms: default_jitter_min(),
            jitter_max_ms: default_jitter_max(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    2000
}

fn default_jitter_min() -> u64 {
    500
}

fn default_jitter_max() -> u64 {
    1500
}

impl RetryConfig {
    /// Retry without waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_base_ms: 0,
            jitter_min_ms: 0,
            jitter_max_ms: 0,
        }
    }

    /// Set the maximum number of attempts
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let base = Duration::from_millis(self.backoff_base_ms.saturating_mul(attempt as u64));
        base + random_between(
            Duration::from_millis(self.jitter_min_ms),
            Duration::from_millis(self.jitter_max_ms),
        )
    }
}

/// Uniformly random duration in `[min, max]` (bounds in either order)
pub fn random_between(min: Duration, max: Duration) -> Duration {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    if lo == hi {
        return lo;
    }
    let millis = rand::thread_rng().gen_range(lo.as_millis() as u64..=hi.as_millis() as u64);
    Duration::from_millis(millis)
}

/// Bookkeeping for one logical request; never shared between requests.
#[derive(Debug, Default)]
struct RetryState {
    attempt: u32,
    last_error: Option<RequestError>,
    backoff: Duration,
}

impl RetryState {
    fn into_error(self) -> RequestError {
        self.last_error
            .unwrap_or_else(|| RequestError::Other("request was never attempted".to_string()))
    }
}

/// Execute an async operation, retrying transient failures
///
/// Non-transient errors (see [`RequestError::is_transient`]) are returned
/// immediately. After `max_attempts` the last error is returned.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    label: &str,
    mut operation: F,
) -> Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut state = RetryState::default();

    loop {
        match operation().await {
            Ok(value) => {
                if state.attempt > 0 {
                    tracing::debug!(
                        "{} succeeded after {} failed attempt(s)",
                        label,
                        state.attempt
                    );
                }
                return Ok(value);
            }
            Err(error) => {
                state.attempt += 1;
                let retry = error.is_transient() && state.attempt < max_attempts;
                if !retry {
                    if error.is_transient() {
                        tracing::warn!(
                            "{} failed after {} attempt(s): {}",
                            label,
                            state.attempt,
                            error
                        );
                    }
                    state.last_error = Some(error);
                    break;
                }

                state.backoff = config.backoff_for(state.attempt);
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:.2}s...",
                    label,
                    state.attempt,
                    max_attempts,
                    error,
                    state.backoff.as_secs_f64()
                );
                state.last_error = Some(error);
                sleep(state.backoff).await;
            }
        }
    }

    Err(state.into_error())
}
