//! # GeoNames Indexer Shared
//!
//! Data types shared by the repository and pipeline crates: the raw
//! tab-separated record as read from a GeoNames dump, and the document
//! derived from it that is upserted into the search index.

mod document;
mod record;

pub use document::{GeoPoint, GeonameDocument, MultiValue};
pub use record::{fields, RawRecord};
