//! Paginated listing collection.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::pool::{clamp_workers, run_bounded};
use super::CollectError;
use crate::config::{Config, DEFAULT_PAGE_SIZE, SAFE_METADATA_WORKERS_MAX};
use crate::models::{ListingFilter, PageRequest, SchoolRecord};
use crate::sources::SchoolDirectory;
use crate::utils::ProgressTracker;

/// Tunables for [`PageCollector`]
#[derive(Debug, Clone, PartialEq)]
pub struct CollectPolicy {
    /// Page size when the total cannot be discovered
    pub default_page_size: u32,
    /// Upper bound on concurrent page requests
    pub max_workers: usize,
    /// Sequential attempts per failed page after the concurrent pass
    pub recovery_attempts: u32,
    /// Recovery attempt `n` waits `n * recovery_backoff` after failing
    pub recovery_backoff: Duration,
}

impl Default for CollectPolicy {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_workers: SAFE_METADATA_WORKERS_MAX,
            recovery_attempts: 3,
            recovery_backoff: Duration::from_secs(1),
        }
    }
}

impl CollectPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_page_size: config.collection.default_page_size.max(1),
            max_workers: config.workers.max_metadata,
            recovery_attempts: config.collection.recovery_attempts,
            recovery_backoff: Duration::from_millis(config.collection.recovery_backoff_ms),
        }
    }
}

/// Result of a collection run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    /// Records of every fetched page, in ascending page order
    pub records: Vec<SchoolRecord>,
    /// Total reported by the backend on page 0
    pub reported_total: u64,
    /// Page size actually used
    pub page_size: u32,
    /// Number of pages that were requested
    pub total_pages: u32,
    /// Pages that still failed after recovery; they contribute no records
    pub failed_pages: Vec<u32>,
}

impl Collection {
    /// Whether every requested page was fetched
    pub fn is_complete(&self) -> bool {
        self.failed_pages.is_empty()
    }
}

/// Fetches every page of a listing through a bounded worker pool
#[derive(Debug, Clone)]
pub struct PageCollector {
    directory: Arc<dyn SchoolDirectory>,
    policy: CollectPolicy,
}

impl PageCollector {
    pub fn new(directory: Arc<dyn SchoolDirectory>, policy: CollectPolicy) -> Self {
        Self { directory, policy }
    }

    /// Effective page size for a caller hint.
    ///
    /// A positive hint is used as is. Otherwise a one-record probe discovers
    /// the total and the whole listing is fetched as a single page; when the
    /// total is zero, missing, or the probe fails, the default size is used.
    pub async fn resolve_page_size(&self, filter: &ListingFilter, hint: i64) -> u32 {
        let default_size = self.policy.default_page_size.max(1);
        if hint > 0 {
            return u32::try_from(hint).unwrap_or(u32::MAX);
        }

        tracing::info!("Fetching metadata to determine total count...");
        match self.directory.fetch_page(&PageRequest::new(0, 1, filter)).await {
            Ok(probe) => match probe.total.filter(|total| *total > 0) {
                Some(total) => {
                    tracing::info!(
                        "Auto-detected total records: {}. Setting page size to {}.",
                        total,
                        total
                    );
                    u32::try_from(total).unwrap_or(u32::MAX)
                }
                None => {
                    tracing::info!(
                        "Could not determine total. Defaulting page size to {}.",
                        default_size
                    );
                    default_size
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Error fetching metadata: {}. Defaulting page size to {}.",
                    e,
                    default_size
                );
                default_size
            }
        }
    }

    /// Collect every page of the listing.
    ///
    /// Fails only when page 0 cannot be fetched or the listing is empty.
    /// Pages that fail both the concurrent pass and recovery are reported in
    /// [`Collection::failed_pages`] and contribute no records.
    pub async fn collect(
        &self,
        filter: &ListingFilter,
        page_size_hint: i64,
        max_pages: Option<u32>,
        workers: usize,
    ) -> Result<Collection, CollectError> {
        let page_size = self.resolve_page_size(filter, page_size_hint).await;

        let first = self
            .directory
            .fetch_page(&PageRequest::new(0, page_size, filter))
            .await
            .map_err(CollectError::FirstPage)?;
        let total = first.effective_total();
        if total == 0 {
            return Err(CollectError::EmptyListing);
        }

        let mut total_pages = u32::try_from(total.div_ceil(page_size as u64)).unwrap_or(u32::MAX);
        if let Some(max) = max_pages.filter(|max| *max > 0) {
            total_pages = total_pages.min(max);
        }
        tracing::info!("Total pages to fetch: {}", total_pages);

        let mut pages: BTreeMap<u32, Vec<SchoolRecord>> = BTreeMap::new();
        pages.insert(0, first.data);

        let workers = clamp_workers(workers, self.policy.max_workers);
        let progress = ProgressTracker::new("Pages", total_pages as usize, 5);
        progress.preload(1);

        let mut failed = Vec::new();
        if total_pages > 1 {
            tracing::debug!("Fetching pages 1..{} with {} worker(s)", total_pages, workers);
            let directory = self.directory.clone();
            let shared_filter = filter.clone();
            let pending: Vec<u32> = (1..total_pages).collect();
            let results = run_bounded(pending, workers, &progress, move |page| {
                let directory = directory.clone();
                let request = PageRequest::new(page, page_size, &shared_filter);
                async move { directory.fetch_page(&request).await }
            })
            .await;

            for (page, result) in results {
                match result {
                    Ok(response) => {
                        pages.insert(page, response.data);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to fetch page {}: {}", page, e);
                        failed.push(page);
                    }
                }
            }
        }

        let failed_pages = self.recover(filter, page_size, failed, &mut pages).await;

        let records: Vec<SchoolRecord> = pages.into_values().flatten().collect();
        if !failed_pages.is_empty() {
            tracing::warn!(
                "{} page(s) permanently failed: {:?}. Collected {} of {} reported records.",
                failed_pages.len(),
                failed_pages,
                records.len(),
                total
            );
        }
        tracing::info!(
            "Fetched metadata for {} schools (reported total {}) in {:.1}s",
            records.len(),
            total,
            progress.elapsed().as_secs_f64()
        );

        Ok(Collection {
            records,
            reported_total: total,
            page_size,
            total_pages,
            failed_pages,
        })
    }

    /// Retry failed pages one at a time; returns the pages that stayed failed
    async fn recover(
        &self,
        filter: &ListingFilter,
        page_size: u32,
        failed: Vec<u32>,
        pages: &mut BTreeMap<u32, Vec<SchoolRecord>>,
    ) -> Vec<u32> {
        let mut permanent = Vec::new();
        if failed.is_empty() {
            return permanent;
        }
        tracing::info!("Retrying {} failed page(s)", failed.len());

        let attempts = self.policy.recovery_attempts.max(1);
        for page in failed {
            let request = PageRequest::new(page, page_size, filter);
            for attempt in 1..=attempts {
                match self.directory.fetch_page(&request).await {
                    Ok(response) => {
                        tracing::info!("Recovered page {} on attempt {}", page, attempt);
                        pages.insert(page, response.data);
                        break;
                    }
                    Err(e) if attempt >= attempts => {
                        tracing::warn!("Permanent failure for page {}: {}", page, e);
                        permanent.push(page);
                    }
                    Err(e) => {
                        tracing::debug!(
                            "Recovery attempt {} for page {} failed: {}",
                            attempt,
                            page,
                            e
                        );
                        tokio::time::sleep(self.policy.recovery_backoff * attempt).await;
                    }
                }
            }
        }
        permanent
    }
}
