//! # Sekolah Export
//!
//! Exports the Sekolah Kita school directory (sekolah.data.kemendikdasmen.go.id)
//! to CSV, enriching every school with its phone number.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Wire types (SchoolRecord, PageRequest, ListingFilter, etc.)
//! - [`sources`]: The `SchoolDirectory` trait with the HTTP backend and a mock
//! - [`harvest`]: Concurrent page collection and detail enrichment
//! - [`export`]: CSV assembly and output naming
//! - [`utils`]: Rate-limited HTTP client, retry and progress reporting
//! - [`config`]: Configuration management
//! - [`logging`]: Tracing subscriber setup

pub mod config;
pub mod export;
pub mod harvest;
pub mod logging;
pub mod models;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use harvest::{Harvest, HarvestOptions, Harvester};
pub use models::{ListingFilter, SchoolRecord};
pub use sources::{SchoolDirectory, SekolahKitaApi};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
