//! # GeoNames Indexer Repository
//!
//! This crate provides the interface the ingestion pipeline uses to write to
//! the search engine, together with a concrete implementation for OpenSearch
//! and the index mapping for GeoNames documents.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod types;

pub use config::OpenSearchConfig;
pub use errors::SearchIndexError;
pub use interfaces::BulkIndexProvider;
pub use opensearch::OpenSearchClient;
pub use types::{BulkItemError, BulkItemResult, BulkResponse, IndexName};
