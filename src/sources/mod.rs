//! School directory backends.
//!
//! This module defines the [`SchoolDirectory`] trait that the paging and
//! enrichment engines are written against. Two implementations ship with the
//! crate:
//!
//! - [`SekolahKitaApi`]: the HTTP backend, built on
//!   [`RateLimitedClient`](crate::utils::RateLimitedClient)
//! - [`MockDirectory`]: an in-process backend with scriptable failures and
//!   latency, used by tests

pub mod mock;
mod sekolah_kita;

pub use mock::MockDirectory;
pub use sekolah_kita::SekolahKitaApi;

use crate::models::{ListingFilter, PageRequest, PageResponse};
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Interface to a paginated school listing with a per-school detail lookup.
#[async_trait]
pub trait SchoolDirectory: Send + Sync + std::fmt::Debug {
    /// Human-readable name of this backend
    fn name(&self) -> &str;

    /// Fetch one listing page
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, RequestError>;

    /// Fetch the raw detail payload for one school
    async fn fetch_detail(&self, school_id: &str) -> Result<serde_json::Value, RequestError>;

    /// Regency/city names of schools matching a keyword, sorted and unique
    async fn suggest_regions(&self, keyword: &str) -> Result<Vec<String>, RequestError> {
        let request = PageRequest::new(0, 100, &ListingFilter::unfiltered().keyword(keyword));
        let page = self.fetch_page(&request).await?;

        let regions: BTreeSet<String> = page
            .data
            .into_iter()
            .filter_map(|record| record.locality)
            .collect();
        Ok(regions.into_iter().collect())
    }
}

/// Errors that can occur when talking to a directory backend
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Connection or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// The request exceeded its timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Non-success HTTP status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Body was not valid JSON or not the expected shape
    #[error("Malformed response: {0}")]
    Decode(String),

    /// The request URL could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl RequestError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            RequestError::Network(_) | RequestError::Timeout(_) | RequestError::Decode(_) => true,
            RequestError::Status { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            RequestError::InvalidUrl(_) | RequestError::Other(_) => false,
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RequestError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            RequestError::Status {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else if err.is_decode() {
            RequestError::Decode(err.to_string())
        } else {
            RequestError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(err: serde_json::Error) -> Self {
        RequestError::Decode(format!("JSON: {}", err))
    }
}

impl From<url::ParseError> for RequestError {
    fn from(err: url::ParseError) -> Self {
        RequestError::InvalidUrl(err.to_string())
    }
}
