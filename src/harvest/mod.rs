//! Two-phase harvest: collect the listing, then enrich it with details.
//!
//! - [`PageCollector`]: fetches every listing page concurrently and merges
//!   them in page order
//! - [`DetailEnricher`]: looks up the contact of every collected school
//! - [`Harvester`]: runs both phases for a set of [`HarvestOptions`]

mod details;
mod pages;
mod pool;

pub use details::{extract_contact, identifiers_of, DetailEnricher, Enrichment, CONTACT_FIELD};
pub use pages::{Collection, CollectPolicy, PageCollector};
pub use pool::clamp_workers;

use std::sync::Arc;

use crate::config::Config;
use crate::models::ListingFilter;
use crate::sources::{RequestError, SchoolDirectory};

/// Fatal collection errors
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("Failed to fetch the first listing page: {0}")]
    FirstPage(#[source] RequestError),

    #[error("No schools found for the given filters")]
    EmptyListing,
}

/// What to harvest and how hard to push
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestOptions {
    pub filter: ListingFilter,
    /// Positive values are used as is; zero or negative auto-detects
    pub page_size: i64,
    /// Upper bound on pages fetched (`None` or zero = all)
    pub max_pages: Option<u32>,
    pub metadata_workers: usize,
    pub detail_workers: usize,
    /// Run the enrichment phase
    pub fetch_contacts: bool,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl HarvestOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            filter: config.filter.to_filter(),
            page_size: 0,
            max_pages: None,
            metadata_workers: config.workers.metadata,
            detail_workers: config.workers.detail,
            fetch_contacts: true,
        }
    }
}

/// Output of a harvest run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Harvest {
    pub collection: Collection,
    /// Empty when contacts were not requested
    pub enrichment: Enrichment,
}

/// Runs the collection and enrichment phases against one directory
#[derive(Debug, Clone)]
pub struct Harvester {
    collector: PageCollector,
    enricher: DetailEnricher,
}

impl Harvester {
    pub fn new(directory: Arc<dyn SchoolDirectory>, config: &Config) -> Self {
        Self {
            collector: PageCollector::new(directory.clone(), CollectPolicy::from_config(config)),
            enricher: DetailEnricher::from_config(directory, config),
        }
    }

    pub async fn run(&self, options: &HarvestOptions) -> Result<Harvest, CollectError> {
        let collection = self
            .collector
            .collect(
                &options.filter,
                options.page_size,
                options.max_pages,
                options.metadata_workers,
            )
            .await?;

        if collection.records.is_empty() {
            return Err(CollectError::EmptyListing);
        }

        let enrichment = if options.fetch_contacts {
            let identifiers = identifiers_of(&collection.records);
            self.enricher
                .enrich(identifiers, options.detail_workers)
                .await
        } else {
            tracing::info!("Skipping contact lookup");
            Enrichment::default()
        };

        Ok(Harvest {
            collection,
            enrichment,
        })
    }
}
