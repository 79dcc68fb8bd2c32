//! Utility modules supporting the export pipeline.
//!
//! - [`RateLimitedClient`]: JSON client with pre-request delay, optional global
//!   rate ceiling and retry
//! - [`RetryConfig`] / [`with_retry`]: retry with linear backoff and jitter
//! - [`ProgressTracker`]: mutex-guarded completion counters for fan-out phases
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use sekolah_export::sources::RequestError;
//! use sekolah_export::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch_data() -> Result<String, RequestError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), RequestError> {
//! let config = RetryConfig::default().max_attempts(3);
//! let result = with_retry(&config, "fetch data", || fetch_data()).await?;
//! # Ok(())
//! # }
//! ```

mod http;
mod progress;
mod retry;

pub use http::RateLimitedClient;
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use retry::{random_between, with_retry, RetryConfig};
