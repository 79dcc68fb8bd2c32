//! HTTP client utilities.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::ACCEPT;
use reqwest::{Client, Method};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::retry::{random_between, with_retry, RetryConfig};
use crate::config::RateLimitConfig;
use crate::sources::RequestError;

/// JSON client that throttles and retries every request
///
/// Each attempt, the first included, is preceded by a random delay drawn from
/// the configured window. Delays are per call, so the aggregate request rate
/// scales with the number of concurrent workers using the client. When
/// `requests_per_second` is set, a limiter shared by all clones caps the
/// aggregate rate as well.
#[derive(Debug, Clone)]
pub struct RateLimitedClient {
    client: Arc<Client>,
    rate_limit: RateLimitConfig,
    retry: RetryConfig,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl RateLimitedClient {
    /// Create a client with its own connection pool
    pub fn new(
        user_agent: &str,
        rate_limit: RateLimitConfig,
        retry: RetryConfig,
    ) -> Result<Self, RequestError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| RequestError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::from_client(Arc::new(client), rate_limit, retry))
    }

    /// Create from an existing reqwest Client
    pub fn from_client(client: Arc<Client>, rate_limit: RateLimitConfig, retry: RetryConfig) -> Self {
        let limiter = rate_limit
            .requests_per_second
            .filter(|_| rate_limit.enabled)
            .and_then(NonZeroU32::new)
            .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));

        Self {
            client,
            rate_limit,
            retry,
            limiter,
        }
    }

    /// Rate limiting settings in effect
    pub fn rate_limit(&self) -> &RateLimitConfig {
        &self.rate_limit
    }

    /// GET a JSON document
    pub async fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, RequestError> {
        self.request(Method::GET, url, None, timeout).await
    }

    /// POST a JSON body and parse the JSON reply
    pub async fn post_json(
        &self,
        url: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<Value, RequestError> {
        self.request(Method::POST, url, Some(body), timeout).await
    }

    /// Issue one logical request, retrying transient failures
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, RequestError> {
        let label = format!("{} {}", method, url);
        with_retry(&self.retry, &label, || {
            self.attempt(method.clone(), url, body, timeout)
        })
        .await
    }

    async fn attempt(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, RequestError> {
        self.throttle().await;

        let mut builder = self
            .client
            .request(method, url)
            .timeout(timeout)
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RequestError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        let value = serde_json::from_str(&String::from_utf8_lossy(&bytes))?;
        Ok(value)
    }

    async fn throttle(&self) {
        if !self.rate_limit.enabled {
            return;
        }
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
        let (min, max) = self.rate_limit.delay_window();
        let delay = random_between(min, max);
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}
