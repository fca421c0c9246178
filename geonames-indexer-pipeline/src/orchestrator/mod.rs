//! Orchestrator module for the GeoNames indexer pipeline.
//!
//! Coordinates the producer, the batch queue and the concurrent bulk
//! submissions, and builds the final report.

mod producer;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::accumulator::Batch;
use crate::errors::PipelineError;
use crate::loader::{BatchResult, BulkIndexer, DocumentOutcome, LoaderConfig};
use crate::report::{FailedRecord, FailureKind, IngestionReport, ReportAccumulator};
use geonames_indexer_repository::opensearch::geonames_index_settings;
use geonames_indexer_repository::{BulkIndexProvider, IndexName};
use producer::RecordProducer;

/// Tuning for an ingestion run.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Maximum documents per bulk request.
    pub max_batch_documents: usize,
    /// Maximum estimated bytes per bulk request.
    pub max_batch_bytes: usize,
    /// Maximum bulk requests in flight at once.
    pub max_in_flight_batches: usize,
    /// Completed batches that may wait for a free submission slot before the
    /// producer blocks.
    pub queue_capacity: usize,
    /// Total bulk attempts per batch.
    pub max_retries: u32,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    /// Cancel the run on the first failed record.
    pub fail_fast: bool,
    /// How long in-flight batches may keep running after cancellation.
    pub shutdown_timeout_ms: u64,
    /// Optional quote character for quoted fields.
    pub quote: Option<char>,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_batch_documents: 500,
            max_batch_bytes: 5 * 1024 * 1024,
            max_in_flight_batches: 4,
            queue_capacity: 4,
            max_retries: 3,
            initial_retry_delay_ms: 100,
            max_retry_delay_ms: 5000,
            fail_fast: false,
            shutdown_timeout_ms: 10_000,
            quote: None,
        }
    }
}

impl IngestionConfig {
    pub fn with_batch_size(mut self, max_documents: usize) -> Self {
        self.max_batch_documents = max_documents;
        self
    }

    pub fn with_batch_bytes(mut self, max_bytes: usize) -> Self {
        self.max_batch_bytes = max_bytes;
        self
    }

    /// Set the number of concurrent submissions. The queue capacity follows.
    pub fn with_concurrency(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight_batches = max_in_flight.max(1);
        self.queue_capacity = self.max_in_flight_batches;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delays(mut self, initial_ms: u64, max_ms: u64) -> Self {
        self.initial_retry_delay_ms = initial_ms;
        self.max_retry_delay_ms = max_ms;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_quote(mut self, quote: char) -> Self {
        self.quote = Some(quote);
        self
    }

    fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            max_retries: self.max_retries,
            initial_retry_delay_ms: self.initial_retry_delay_ms,
            max_retry_delay_ms: self.max_retry_delay_ms,
        }
    }
}

/// Lifecycle of an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionState {
    Idle,
    /// Reading input and submitting full batches.
    Streaming,
    /// Input exhausted; waiting for submitted batches to resolve.
    Draining,
    /// Cancellation observed; waiting for or abandoning in-flight batches.
    Cancelling,
    /// The report is final.
    Finished,
}

impl fmt::Display for IngestionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestionState::Idle => "idle",
            IngestionState::Streaming => "streaming",
            IngestionState::Draining => "draining",
            IngestionState::Cancelling => "cancelling",
            IngestionState::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Coordinator that drives one ingestion run end to end.
///
/// The coordinator:
/// - Spawns a producer that streams lines through parser, mapper and accumulator
/// - Submits queued batches with at most `max_in_flight_batches` in flight
/// - Folds every outcome into a single report it owns
/// - Handles cancellation and the shutdown timeout
pub struct IngestionCoordinator {
    indexer: Arc<BulkIndexer>,
    config: IngestionConfig,
    cancel: CancellationToken,
    state: watch::Sender<IngestionState>,
    flush: Arc<Notify>,
}

impl IngestionCoordinator {
    /// Create a coordinator writing to `index` through `client`.
    pub fn new(client: Arc<dyn BulkIndexProvider>, index: IndexName, config: IngestionConfig) -> Self {
        let indexer = BulkIndexer::with_config(client, index, config.loader_config());
        let (state, _) = watch::channel(IngestionState::Idle);

        Self {
            indexer: Arc::new(indexer),
            config,
            cancel: CancellationToken::new(),
            state,
            flush: Arc::new(Notify::new()),
        }
    }

    /// Token that cancels the run when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the run. Reading stops immediately.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> IngestionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<IngestionState> {
        self.state.subscribe()
    }

    /// Ask the producer to submit its partial batch without waiting for it
    /// to fill up.
    pub fn request_flush(&self) {
        self.flush.notify_one();
    }

    /// Check backend health and make sure the target index exists.
    pub async fn prepare_index(&self, recreate: bool) -> Result<(), PipelineError> {
        self.indexer.health_check().await?;
        self.indexer
            .ensure_index(&geonames_index_settings(), recreate)
            .await
    }

    fn transition(&self, next: IngestionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "Ingestion state changed");
        }
    }

    /// Run the pipeline over `reader` until the input is exhausted or the run
    /// is cancelled, and return the final report.
    ///
    /// A coordinator runs once; later calls fail with `AlreadyStarted`.
    #[instrument(skip(self, reader), fields(index = %self.indexer.index()))]
    pub async fn run<R>(&self, reader: R) -> Result<IngestionReport, PipelineError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let started = self.state.send_if_modified(|state| {
            if *state == IngestionState::Idle {
                *state = IngestionState::Streaming;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(PipelineError::AlreadyStarted);
        }

        info!(
            batch_size = self.config.max_batch_documents,
            concurrency = self.config.max_in_flight_batches,
            "Starting ingestion"
        );

        let mut report = ReportAccumulator::new(self.indexer.index().as_str());
        let (batch_tx, mut batch_rx) = mpsc::channel::<Batch>(self.config.queue_capacity.max(1));

        let producer = RecordProducer::new(&self.config, self.cancel.clone(), self.flush.clone());
        let producer_handle = tokio::spawn(producer.run(reader, batch_tx));

        let max_in_flight = self.config.max_in_flight_batches.max(1);
        let mut in_flight: JoinSet<BatchResult> = JoinSet::new();
        let mut pending: HashMap<u64, Vec<(u64, u64)>> = HashMap::new();
        let mut input_open = true;

        loop {
            if !input_open && in_flight.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => match joined {
                    Ok(result) => self.collect(result, &mut pending, &mut report),
                    Err(e) => error!(error = %e, "Batch submission task failed"),
                },
                batch = batch_rx.recv(), if input_open && in_flight.len() < max_in_flight => match batch {
                    Some(batch) => {
                        pending.insert(batch.sequence, batch.keys());
                        let indexer = self.indexer.clone();
                        let cancel = self.cancel.clone();
                        in_flight.spawn(async move { indexer.submit(batch, &cancel).await });
                    }
                    None => {
                        input_open = false;
                        self.transition(IngestionState::Draining);
                    }
                },
            }
        }

        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            self.transition(IngestionState::Cancelling);
            self.shutdown(&mut batch_rx, &mut in_flight, &mut pending, &mut report)
                .await;
        }

        for (_, keys) in pending.drain() {
            let kind = if cancelled {
                FailureKind::Cancelled
            } else {
                FailureKind::Rejected {
                    reason: "batch submission terminated unexpectedly".to_string(),
                }
            };
            for (line, id) in keys {
                report.record_failure(FailedRecord::document(line, id, kind.clone()));
            }
        }

        let summary = producer_handle
            .await
            .map_err(|e| PipelineError::channel(format!("record producer failed: {}", e)))?;

        report.record_attempted(summary.attempted);
        report.record_warnings(summary.warnings);
        for failure in summary.failures {
            report.record_failure(failure);
        }

        let report = report.finish(cancelled || summary.read_error.is_some());
        self.transition(IngestionState::Finished);

        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            cancelled = report.cancelled,
            "Ingestion finished"
        );

        Ok(report)
    }

    /// Drop queued batches and give in-flight ones until the shutdown
    /// timeout to resolve. Whatever is still running after that is aborted.
    async fn shutdown(
        &self,
        batch_rx: &mut mpsc::Receiver<Batch>,
        in_flight: &mut JoinSet<BatchResult>,
        pending: &mut HashMap<u64, Vec<(u64, u64)>>,
        report: &mut ReportAccumulator,
    ) {
        batch_rx.close();
        while let Some(batch) = batch_rx.recv().await {
            for (line, id) in batch.keys() {
                report.record_failure(FailedRecord::document(line, id, FailureKind::Cancelled));
            }
        }

        info!(in_flight = in_flight.len(), "Waiting for in-flight batches");
        let deadline = Instant::now() + Duration::from_millis(self.config.shutdown_timeout_ms);

        loop {
            match tokio::time::timeout_at(deadline, in_flight.join_next()).await {
                Ok(Some(Ok(result))) => self.collect(result, pending, report),
                Ok(Some(Err(e))) => debug!(error = %e, "Batch submission task ended"),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        abandoned = in_flight.len(),
                        "Shutdown timeout elapsed, abandoning in-flight batches"
                    );
                    in_flight.abort_all();
                    while let Some(joined) = in_flight.join_next().await {
                        if let Ok(result) = joined {
                            self.collect(result, pending, report);
                        }
                    }
                    break;
                }
            }
        }
    }

    /// Fold one batch result into the report.
    fn collect(
        &self,
        result: BatchResult,
        pending: &mut HashMap<u64, Vec<(u64, u64)>>,
        report: &mut ReportAccumulator,
    ) {
        pending.remove(&result.sequence);
        if result.attempts > 0 {
            let retries = result.attempts - 1 + result.resubmissions;
            report.record_batch(retries as u64);
        }

        debug!(
            sequence = result.sequence,
            indexed = result.indexed(),
            total = result.outcomes.len(),
            "Batch resolved"
        );

        for document in result.outcomes {
            match document.outcome {
                DocumentOutcome::Indexed => {
                    info!(geoname_id = document.id, name = %document.name, "Added document");
                    report.record_success();
                }
                DocumentOutcome::PermanentFailure(kind) => {
                    if self.config.fail_fast && kind != FailureKind::Cancelled && !self.cancel.is_cancelled() {
                        warn!(geoname_id = document.id, "Stopping after first failure");
                        self.cancel.cancel();
                    }
                    report.record_failure(FailedRecord::document(document.line, document.id, kind));
                }
                DocumentOutcome::RetryableFailure(reason) => {
                    report.record_failure(FailedRecord::document(
                        document.line,
                        document.id,
                        FailureKind::RetriesExhausted { reason },
                    ));
                }
            }
        }
    }
}
