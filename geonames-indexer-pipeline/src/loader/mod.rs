//! Loader module for the GeoNames indexer pipeline.
//!
//! Submits batches to the search index and accounts for each document.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::accumulator::Batch;
use crate::errors::PipelineError;
use crate::report::FailureKind;
use geonames_indexer_repository::{BulkIndexProvider, BulkItemResult, IndexName};

/// Configuration for the bulk indexer.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Total bulk attempts allowed per batch, the first submission included.
    pub max_retries: u32,
    /// Initial retry delay in milliseconds.
    pub initial_retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds.
    pub max_retry_delay_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_retry_delay_ms: 100,
            max_retry_delay_ms: 5000,
        }
    }
}

/// Outcome of one document within a submitted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// The backend stored the document.
    Indexed,
    /// The backend refused the document for load reasons; it may be sent again.
    RetryableFailure(String),
    /// The document will not be indexed.
    PermanentFailure(FailureKind),
}

/// Result for a single document, in batch order.
#[derive(Debug, Clone)]
pub struct DocumentResult {
    pub line: u64,
    pub id: u64,
    pub name: String,
    pub outcome: DocumentOutcome,
}

/// Result of submitting one batch.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub sequence: u64,
    /// Bulk requests sent for the whole batch.
    pub attempts: u32,
    /// Single-document requests sent for retryable item failures.
    pub resubmissions: u32,
    /// One entry per document, in submission order.
    pub outcomes: Vec<DocumentResult>,
}

impl BatchResult {
    pub fn indexed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|r| r.outcome == DocumentOutcome::Indexed)
            .count()
    }

    pub fn has_permanent_failures(&self) -> bool {
        self.outcomes
            .iter()
            .any(|r| matches!(r.outcome, DocumentOutcome::PermanentFailure(_)))
    }
}

/// Indexer that upserts batches into the search engine.
///
/// The indexer is responsible for:
/// - Retrying whole batches on transient failures with exponential backoff and jitter
/// - Reporting per-document outcomes of partially successful bulk requests
/// - Resubmitting documents throttled individually, alone and once
/// - Not starting any request once cancellation is observed
///
/// It is shared between concurrent submissions; it holds no per-batch state.
pub struct BulkIndexer {
    client: Arc<dyn BulkIndexProvider>,
    index: IndexName,
    config: LoaderConfig,
}

impl BulkIndexer {
    /// Create a new indexer writing to `index` with default configuration.
    pub fn new(client: Arc<dyn BulkIndexProvider>, index: IndexName) -> Self {
        Self::with_config(client, index, LoaderConfig::default())
    }

    /// Create a new indexer with custom configuration.
    pub fn with_config(client: Arc<dyn BulkIndexProvider>, index: IndexName, config: LoaderConfig) -> Self {
        Self { client, index, config }
    }

    pub fn index(&self) -> &IndexName {
        &self.index
    }

    /// Submit a batch and resolve every document to `Indexed` or `PermanentFailure`.
    #[instrument(skip(self, batch, cancel), fields(sequence = batch.sequence, count = batch.len()))]
    pub async fn submit(&self, batch: Batch, cancel: &CancellationToken) -> BatchResult {
        let max_attempts = self.config.max_retries.max(1);
        let mut delay_ms = self.config.initial_retry_delay_ms;
        let mut attempts = 0;

        let response = loop {
            if cancel.is_cancelled() {
                return Self::resolve_all(batch, attempts, FailureKind::Cancelled);
            }

            attempts += 1;
            match self.client.bulk_upsert(&self.index, &batch.documents).await {
                Ok(response) => {
                    if attempts > 1 {
                        info!(attempt = attempts, "Bulk index succeeded after retry");
                    }
                    break response;
                }
                Err(e) if e.is_retryable() && attempts < max_attempts => {
                    warn!(
                        attempt = attempts,
                        max_retries = max_attempts,
                        delay_ms = delay_ms,
                        error = %e,
                        "Bulk index failed, retrying"
                    );

                    if !Self::backoff(delay_ms, cancel).await {
                        return Self::resolve_all(batch, attempts, FailureKind::Cancelled);
                    }
                    delay_ms = std::cmp::min(delay_ms.saturating_mul(2), self.config.max_retry_delay_ms);
                }
                Err(e) => {
                    let kind = if e.is_retryable() {
                        warn!(attempts = attempts, error = %e, "Bulk index failed, retries exhausted");
                        FailureKind::RetriesExhausted { reason: e.to_string() }
                    } else {
                        warn!(error = %e, "Bulk index rejected");
                        FailureKind::Rejected { reason: e.to_string() }
                    };
                    return Self::resolve_all(batch, attempts, kind);
                }
            }
        };

        let mut outcomes: Vec<DocumentResult> = batch
            .lines
            .iter()
            .zip(&batch.documents)
            .enumerate()
            .map(|(position, (line, document))| DocumentResult {
                line: *line,
                id: document.id,
                name: document.name.clone(),
                outcome: Self::classify(response.items.get(position)),
            })
            .collect();

        let mut resubmissions = 0;
        for position in 0..outcomes.len() {
            if let DocumentOutcome::RetryableFailure(reason) = &outcomes[position].outcome {
                debug!(geoname_id = outcomes[position].id, reason = %reason, "Resubmitting document");
                resubmissions += 1;
                let outcome = self
                    .resubmit(&batch, position, reason.clone(), cancel)
                    .await;
                outcomes[position].outcome = outcome;
            }
        }

        BatchResult {
            sequence: batch.sequence,
            attempts,
            resubmissions,
            outcomes,
        }
    }

    /// Send a single throttled document once more, after the initial delay.
    async fn resubmit(
        &self,
        batch: &Batch,
        position: usize,
        reason: String,
        cancel: &CancellationToken,
    ) -> DocumentOutcome {
        if !Self::backoff(self.config.initial_retry_delay_ms, cancel).await {
            return DocumentOutcome::PermanentFailure(FailureKind::Cancelled);
        }

        let document = std::slice::from_ref(&batch.documents[position]);
        match self.client.bulk_upsert(&self.index, document).await {
            Ok(response) => match Self::classify(response.items.first()) {
                DocumentOutcome::RetryableFailure(reason) => {
                    DocumentOutcome::PermanentFailure(FailureKind::RetriesExhausted { reason })
                }
                outcome => outcome,
            },
            Err(e) if e.is_retryable() => {
                DocumentOutcome::PermanentFailure(FailureKind::RetriesExhausted {
                    reason: format!("{} (first failure: {})", e, reason),
                })
            }
            Err(e) => DocumentOutcome::PermanentFailure(FailureKind::Rejected { reason: e.to_string() }),
        }
    }

    fn classify(item: Option<&BulkItemResult>) -> DocumentOutcome {
        match item {
            Some(item) if item.is_success() => DocumentOutcome::Indexed,
            Some(item) if item.is_retryable() => DocumentOutcome::RetryableFailure(item.reason()),
            Some(item) => DocumentOutcome::PermanentFailure(FailureKind::Rejected { reason: item.reason() }),
            None => DocumentOutcome::PermanentFailure(FailureKind::Rejected {
                reason: "no result for document in bulk response".to_string(),
            }),
        }
    }

    /// Give every document in the batch the same terminal outcome.
    fn resolve_all(batch: Batch, attempts: u32, kind: FailureKind) -> BatchResult {
        let outcomes = batch
            .lines
            .into_iter()
            .zip(batch.documents)
            .map(|(line, document)| DocumentResult {
                line,
                id: document.id,
                name: document.name,
                outcome: DocumentOutcome::PermanentFailure(kind.clone()),
            })
            .collect();

        BatchResult {
            sequence: batch.sequence,
            attempts,
            resubmissions: 0,
            outcomes,
        }
    }

    /// Sleep for `delay_ms` plus up to 50% jitter. Returns `false` if
    /// cancelled while waiting.
    async fn backoff(delay_ms: u64, cancel: &CancellationToken) -> bool {
        let jitter = rand::thread_rng().gen_range(0..=delay_ms / 2);
        let delay = Duration::from_millis(delay_ms + jitter);

        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Ensure the target index exists with the given mapping.
    ///
    /// An existing index is reused unless `recreate` is set, in which case it
    /// is deleted and created again.
    pub async fn ensure_index(&self, settings: &Value, recreate: bool) -> Result<(), PipelineError> {
        let exists = self.client.index_exists(&self.index).await?;

        if exists && recreate {
            info!(index = %self.index, "Recreating existing index");
            self.client.delete_index(&self.index).await?;
        } else if exists {
            warn!(index = %self.index, "Index already exists, documents will be upserted into it");
            return Ok(());
        }

        self.client.create_index(&self.index, settings).await?;
        Ok(())
    }

    /// Check that the search engine is reachable and healthy.
    pub async fn health_check(&self) -> Result<(), PipelineError> {
        if self.client.health_check().await? {
            Ok(())
        } else {
            Err(PipelineError::BackendUnhealthy)
        }
    }
}
