//! Bulk index provider trait definition.
//!
//! This module defines the abstract interface for the write side of a search
//! index, allowing for different backend implementations (OpenSearch, in-memory
//! test doubles, etc.).

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::SearchIndexError;
use crate::types::{BulkResponse, IndexName};
use geonames_indexer_shared::GeonameDocument;

/// Abstracts the underlying search index implementation.
///
/// Implementations are injected into the pipeline's bulk indexer, which makes
/// it possible to test batching and retry behaviour without a running cluster.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` so a single provider can be shared
/// by concurrent batch submissions.
#[async_trait]
pub trait BulkIndexProvider: Send + Sync {
    /// Check if the search engine is healthy and reachable.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the search engine is healthy
    /// * `Ok(false)` - If the search engine is reachable but unhealthy
    /// * `Err(SearchIndexError)` - If the health check fails to execute
    async fn health_check(&self) -> Result<bool, SearchIndexError>;

    /// Check whether `index` exists.
    async fn index_exists(&self, index: &IndexName) -> Result<bool, SearchIndexError>;

    /// Create `index` with the given settings and mappings body.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the index was created
    /// * `Err(SearchIndexError::IndexCreationError)` - If the engine refused it,
    ///   including when the index already exists
    async fn create_index(&self, index: &IndexName, settings: &Value) -> Result<(), SearchIndexError>;

    /// Delete `index`. Deleting a missing index is not an error.
    async fn delete_index(&self, index: &IndexName) -> Result<(), SearchIndexError>;

    /// Create or replace every document in `documents`, keyed by its id.
    ///
    /// A request-level failure (unreachable engine, throttling of the whole
    /// request, malformed request) is returned as `Err`. Otherwise the
    /// response holds exactly one item per document, in submission order,
    /// and individual items may have failed.
    ///
    /// # Arguments
    ///
    /// * `index` - Target index
    /// * `documents` - Documents to upsert
    async fn bulk_upsert(
        &self,
        index: &IndexName,
        documents: &[GeonameDocument],
    ) -> Result<BulkResponse, SearchIndexError>;
}
