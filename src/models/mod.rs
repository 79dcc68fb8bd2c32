//! Core data models for the school directory listing.

mod listing;
mod school;

pub use listing::{ListingFilter, PageRequest, EARLY_CHILDHOOD_CATEGORIES};
pub use school::{scalar_to_string, PageResponse, SchoolRecord};
