//! Listing request models.

use serde::{Deserialize, Serialize};

/// Early-childhood education levels, comma-joined for the backend's OR filter
pub const EARLY_CHILDHOOD_CATEGORIES: &str = "KB,MAK,PAUDQ,RA,SPKTK,SPKPG,SPS,TK,TKLB,TPA";

/// Filter criteria applied to every listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFilter {
    /// Free-text keyword
    #[serde(default)]
    pub keyword: String,

    /// Regency/city name, exact match (e.g. "Kota Bandung")
    #[serde(rename = "kabupaten_kota", default)]
    pub region: String,

    /// Comma-joined education level codes ("TK,KB" matches either)
    #[serde(rename = "bentuk_pendidikan", default)]
    pub category: String,

    /// School status filter ("N" negeri, "S" swasta, empty for both)
    #[serde(rename = "status_sekolah", default)]
    pub status: String,
}

impl Default for ListingFilter {
    fn default() -> Self {
        Self {
            keyword: String::new(),
            region: String::new(),
            category: EARLY_CHILDHOOD_CATEGORIES.to_string(),
            status: String::new(),
        }
    }
}

impl ListingFilter {
    /// A filter that matches everything
    pub fn unfiltered() -> Self {
        Self {
            category: String::new(),
            ..Default::default()
        }
    }

    /// Set the keyword
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    /// Set the regency/city filter
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Set the category filter
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the status filter
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Category codes of the comma-joined filter, trimmed; empty means all
    pub fn category_codes(&self) -> Vec<&str> {
        self.category
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .collect()
    }
}

/// Body of a single listing request
///
/// Page indices are zero-based; the backend's page 0 is the first page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    #[serde(flatten)]
    pub filter: ListingFilter,
}

impl PageRequest {
    pub fn new(page: u32, size: u32, filter: &ListingFilter) -> Self {
        Self {
            page,
            size: size.max(1),
            filter: filter.clone(),
        }
    }
}
