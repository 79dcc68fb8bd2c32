//! Mock directory for testing purposes.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::models::{PageRequest, PageResponse, SchoolRecord};
use crate::sources::{RequestError, SchoolDirectory};
use crate::utils::random_between;

/// In-memory directory that pages over a fixed record set.
///
/// Filtering mirrors the backend: `keyword` matches name or locality
/// case-insensitively, `region` matches the locality exactly and the
/// comma-joined `category` filter is an OR over education level codes.
/// Failures and latency can be injected per page or per school.
#[derive(Debug, Default)]
pub struct MockDirectory {
    records: Vec<SchoolRecord>,
    omit_total: bool,
    max_latency: Duration,
    page_failures: Mutex<HashMap<u32, u32>>,
    failing_details: HashSet<String>,
    details: HashMap<String, Value>,
    page_requests: Mutex<Vec<PageRequest>>,
    detail_requests: Mutex<Vec<String>>,
}

impl MockDirectory {
    /// Create a mock over the given records
    pub fn new(records: Vec<SchoolRecord>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    /// Fail the next `times` requests for page `page` (any page size)
    pub fn with_page_failures(self, page: u32, times: u32) -> Self {
        lock(&self.page_failures).insert(page, times);
        self
    }

    /// Fail every request for page `page`
    pub fn with_permanent_page_failure(self, page: u32) -> Self {
        self.with_page_failures(page, u32::MAX)
    }

    /// Fail every detail request for `school_id`
    pub fn with_detail_failure(mut self, school_id: &str) -> Self {
        self.failing_details.insert(school_id.to_string());
        self
    }

    /// Serve a well-formed detail payload carrying `phone`
    pub fn with_contact(self, school_id: &str, phone: &str) -> Self {
        self.with_detail_payload(
            school_id,
            json!({"data": {"sekolah": [{"sekolah_id": school_id, "nomor_telepon": phone}]}}),
        )
    }

    /// Serve an arbitrary detail payload
    pub fn with_detail_payload(mut self, school_id: &str, payload: Value) -> Self {
        self.details.insert(school_id.to_string(), payload);
        self
    }

    /// Sleep a random duration up to `max` before answering, scrambling
    /// completion order
    pub fn with_latency(mut self, max: Duration) -> Self {
        self.max_latency = max;
        self
    }

    /// Leave `total` out of listing responses
    pub fn without_total(mut self) -> Self {
        self.omit_total = true;
        self
    }

    /// Every listing request received, in arrival order
    pub fn page_requests(&self) -> Vec<PageRequest> {
        lock(&self.page_requests).clone()
    }

    /// Every detail request received, in arrival order
    pub fn detail_requests(&self) -> Vec<String> {
        lock(&self.detail_requests).clone()
    }

    fn matching(&self, request: &PageRequest) -> Vec<&SchoolRecord> {
        let filter = &request.filter;
        let keyword = filter.keyword.to_lowercase();
        let codes = filter.category_codes();

        self.records
            .iter()
            .filter(|record| {
                keyword.is_empty()
                    || [&record.name, &record.locality].iter().any(|field| {
                        field
                            .as_deref()
                            .is_some_and(|v| v.to_lowercase().contains(&keyword))
                    })
            })
            .filter(|record| {
                filter.region.is_empty() || record.locality.as_deref() == Some(&filter.region)
            })
            .filter(|record| {
                codes.is_empty()
                    || record
                        .category
                        .as_deref()
                        .is_some_and(|category| codes.contains(&category))
            })
            .collect()
    }

    async fn simulate_latency(&self) {
        if !self.max_latency.is_zero() {
            tokio::time::sleep(random_between(Duration::ZERO, self.max_latency)).await;
        }
    }

    fn take_page_failure(&self, page: u32) -> bool {
        let mut failures = lock(&self.page_failures);
        match failures.get_mut(&page) {
            Some(remaining) if *remaining > 0 => {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl SchoolDirectory for MockDirectory {
    fn name(&self) -> &str {
        "Mock Directory"
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, RequestError> {
        lock(&self.page_requests).push(request.clone());
        self.simulate_latency().await;

        if self.take_page_failure(request.page) {
            return Err(RequestError::Network(format!(
                "injected failure for page {}",
                request.page
            )));
        }

        let matching = self.matching(request);
        let size = request.size.max(1) as usize;
        let start = (request.page as usize).saturating_mul(size);
        let data = matching
            .iter()
            .skip(start)
            .take(size)
            .map(|record| (*record).clone())
            .collect();

        Ok(PageResponse {
            total: (!self.omit_total).then_some(matching.len() as u64),
            data,
        })
    }

    async fn fetch_detail(&self, school_id: &str) -> Result<Value, RequestError> {
        lock(&self.detail_requests).push(school_id.to_string());
        self.simulate_latency().await;

        if self.failing_details.contains(school_id) {
            return Err(RequestError::Network(format!(
                "injected failure for school {}",
                school_id
            )));
        }

        Ok(self
            .details
            .get(school_id)
            .cloned()
            .unwrap_or_else(|| json!({"data": {"sekolah": []}})))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Helper to create `count` numbered records for testing.
pub fn make_records(count: usize) -> Vec<SchoolRecord> {
    (0..count)
        .map(|i| SchoolRecord::new(format!("id-{}", i), format!("Sekolah {}", i)).with_category("TK"))
        .collect()
}
