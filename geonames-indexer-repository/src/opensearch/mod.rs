//! OpenSearch implementation of the bulk index provider.
//!
//! This module provides a concrete implementation of `BulkIndexProvider`
//! using OpenSearch as the backend.

mod client;
mod index_config;

pub use client::OpenSearchClient;
pub use index_config::geonames_index_settings;
