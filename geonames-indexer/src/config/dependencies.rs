//! Dependency initialization and wiring for the GeoNames indexer.

use std::sync::Arc;
use tracing::info;

use crate::{IndexingError, Settings};
use geonames_indexer_pipeline::{IngestionConfig, IngestionCoordinator, PipelineError};
use geonames_indexer_repository::{IndexName, OpenSearchClient};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured coordinator ready to run.
    pub coordinator: IngestionCoordinator,
}

impl Dependencies {
    /// Connect to OpenSearch, verify it is healthy and prepare the target index.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If the backend is unreachable or the index cannot be prepared
    pub async fn new(
        settings: &Settings,
        index: IndexName,
        config: IngestionConfig,
        recreate_index: bool,
    ) -> Result<Self, IndexingError> {
        info!(
            opensearch_url = %settings.opensearch.url,
            index = %index,
            "Initializing dependencies"
        );

        let search_client = OpenSearchClient::new(&settings.opensearch)
            .map_err(|e| IndexingError::config(format!("Failed to create OpenSearch client: {}", e)))?;

        let coordinator = IngestionCoordinator::new(Arc::new(search_client), index, config);

        coordinator
            .prepare_index(recreate_index)
            .await
            .map_err(startup_error)?;

        info!("OpenSearch connection verified");

        Ok(Self { coordinator })
    }
}

/// Turn a failure to prepare the index into a fatal startup error.
fn startup_error(error: PipelineError) -> IndexingError {
    match error {
        PipelineError::BackendUnhealthy => IndexingError::config("OpenSearch cluster is unhealthy"),
        PipelineError::SearchError(e) if e.is_retryable() => {
            IndexingError::config(format!("OpenSearch is unreachable: {}", e))
        }
        e => IndexingError::from(e),
    }
}
