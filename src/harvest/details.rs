//! Per-school detail enrichment.

use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use super::pool::{clamp_workers, run_bounded};
use crate::config::Config;
use crate::models::{scalar_to_string, SchoolRecord};
use crate::sources::SchoolDirectory;
use crate::utils::ProgressTracker;

/// Field of the detail payload holding the phone number
pub const CONTACT_FIELD: &str = "nomor_telepon";

/// Contact values keyed by school identifier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    /// One entry per requested identifier; `None` when no contact is known
    pub contacts: BTreeMap<String, Option<String>>,
    /// Identifiers whose lookup failed after retries
    pub failed: Vec<String>,
}

impl Enrichment {
    /// Contact for a school, if one was found
    pub fn contact(&self, school_id: &str) -> Option<&str> {
        self.contacts.get(school_id).and_then(|c| c.as_deref())
    }

    /// Number of schools with a contact
    pub fn found(&self) -> usize {
        self.contacts.values().filter(|c| c.is_some()).count()
    }
}

/// Pull the phone number out of a detail payload.
///
/// Expected shape is `{"data": {"sekolah": [{"nomor_telepon": ...}]}}`. Any
/// level being absent, of the wrong type, or empty yields `None`.
pub fn extract_contact(payload: &Value) -> Option<String> {
    payload
        .get("data")
        .filter(|data| data.is_object())
        .and_then(|data| data.get("sekolah"))
        .and_then(Value::as_array)
        .and_then(|schools| schools.first())
        .and_then(|school| school.get(CONTACT_FIELD))
        .and_then(scalar_to_string)
}

/// Non-blank identifiers of `records`, first occurrence order, without repeats
pub fn identifiers_of(records: &[SchoolRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(SchoolRecord::identifier)
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// Looks up school details through a bounded worker pool
#[derive(Debug, Clone)]
pub struct DetailEnricher {
    directory: Arc<dyn SchoolDirectory>,
    max_workers: usize,
}

impl DetailEnricher {
    pub fn new(directory: Arc<dyn SchoolDirectory>, max_workers: usize) -> Self {
        Self {
            directory,
            max_workers,
        }
    }

    pub fn from_config(directory: Arc<dyn SchoolDirectory>, config: &Config) -> Self {
        Self::new(directory, config.workers.max_detail)
    }

    /// Fetch one detail per identifier.
    ///
    /// Blank identifiers are skipped. A failed lookup never aborts the batch:
    /// it is logged, recorded in [`Enrichment::failed`] and mapped to `None`.
    pub async fn enrich(&self, identifiers: Vec<String>, workers: usize) -> Enrichment {
        let identifiers: Vec<String> = identifiers
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        let mut enrichment = Enrichment::default();
        if identifiers.is_empty() {
            return enrichment;
        }

        let workers = clamp_workers(workers, self.max_workers);
        tracing::info!(
            "Fetching details for {} schools with {} worker(s)...",
            identifiers.len(),
            workers
        );
        let progress = ProgressTracker::new("Details", identifiers.len(), 10);

        let directory = self.directory.clone();
        let results = run_bounded(identifiers, workers, &progress, move |school_id: String| {
            let directory = directory.clone();
            async move {
                directory
                    .fetch_detail(&school_id)
                    .await
                    .map(|payload| extract_contact(&payload))
            }
        })
        .await;

        for (school_id, result) in results {
            let contact = match result {
                Ok(contact) => contact,
                Err(e) => {
                    tracing::warn!("Failed to fetch detail for {}: {}", school_id, e);
                    enrichment.failed.push(school_id.clone());
                    None
                }
            };
            enrichment.contacts.insert(school_id, contact);
        }

        tracing::info!(
            "Found contacts for {}/{} schools ({} failed) in {:.1}s",
            enrichment.found(),
            enrichment.contacts.len(),
            enrichment.failed.len(),
            progress.elapsed().as_secs_f64()
        );
        enrichment
    }
}
