//! Producer side of the pipeline: reads lines, parses and maps them, and
//! queues full batches for the dispatcher.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::IngestionConfig;
use crate::accumulator::{Batch, BatchAccumulator};
use crate::parser::{strip_line_ending, RecordParser};
use crate::processor::DocumentMapper;
use crate::report::{FailedRecord, FailureKind};

/// What the producer accounted for by itself.
#[derive(Debug, Default)]
pub(crate) struct ProducerSummary {
    /// Non-blank lines read from the source.
    pub attempted: u64,
    pub warnings: u64,
    /// Records that failed before reaching the backend, and documents that
    /// were never queued.
    pub failures: Vec<FailedRecord>,
    /// Set when reading the source failed before end of input.
    pub read_error: Option<io::Error>,
}

pub(crate) struct RecordProducer {
    parser: RecordParser,
    mapper: DocumentMapper,
    accumulator: BatchAccumulator,
    fail_fast: bool,
    cancel: CancellationToken,
    flush: Arc<Notify>,
    summary: ProducerSummary,
}

impl RecordProducer {
    pub(crate) fn new(config: &IngestionConfig, cancel: CancellationToken, flush: Arc<Notify>) -> Self {
        let parser = match config.quote {
            Some(quote) => RecordParser::new().with_quote(quote),
            None => RecordParser::new(),
        };

        Self {
            parser,
            mapper: DocumentMapper::new(),
            accumulator: BatchAccumulator::new(config.max_batch_documents, config.max_batch_bytes),
            fail_fast: config.fail_fast,
            cancel,
            flush,
            summary: ProducerSummary::default(),
        }
    }

    /// Stream `reader` to the end, or until cancelled, queueing batches on
    /// `batches`. Blocks while the queue is full.
    pub(crate) async fn run<R>(mut self, reader: R, batches: mpsc::Sender<Batch>) -> ProducerSummary
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut line_number = 0u64;
        let cancel = self.cancel.clone();
        let flush = self.flush.clone();

        loop {
            // A read interrupted by another branch keeps its partial bytes in
            // `buf`, so the buffer is only cleared once a line is complete.
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(line = line_number, "Stopped reading input");
                    break;
                }
                _ = flush.notified() => {
                    if let Some(batch) = self.accumulator.flush() {
                        debug!(sequence = batch.sequence, count = batch.len(), "Flush requested");
                        if !self.dispatch(batch, &batches).await {
                            break;
                        }
                    }
                    continue;
                }
                read = reader.read_until(b'\n', &mut buf) => read,
            };

            match read {
                Ok(0) if buf.is_empty() => {
                    debug!(lines = line_number, "Reached end of input");
                    break;
                }
                Ok(_) => {
                    line_number += 1;
                    let batch = self.process_line(line_number, &buf);
                    buf.clear();

                    if let Some(batch) = batch {
                        if !self.dispatch(batch, &batches).await {
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!(line = line_number + 1, error = %e, "Failed to read input");
                    self.summary.read_error = Some(e);
                    break;
                }
            }
        }

        if let Some(batch) = self.accumulator.flush() {
            if self.cancel.is_cancelled() {
                self.abandon(batch);
            } else {
                self.dispatch(batch, &batches).await;
            }
        }

        self.summary
    }

    /// Parse and map one line. Returns a batch when the line completes one.
    fn process_line(&mut self, line_number: u64, line: &[u8]) -> Option<Batch> {
        if strip_line_ending(line).is_empty() {
            return None;
        }
        self.summary.attempted += 1;

        let record = match self.parser.parse(line) {
            Ok(record) => record,
            Err(error) => {
                warn!(line = line_number, error = %error, "Skipping malformed line");
                let raw = String::from_utf8_lossy(strip_line_ending(line)).into_owned();
                self.fail(FailedRecord::raw(line_number, raw, FailureKind::Parse { error }));
                return None;
            }
        };

        match self.mapper.map(&record) {
            Ok(mapped) => {
                for warning in &mapped.warnings {
                    warn!(
                        line = line_number,
                        field = warning.field,
                        value = %warning.value,
                        reason = %warning.reason,
                        "Field coerced to default"
                    );
                }
                self.summary.warnings += mapped.warnings.len() as u64;
                self.accumulator.push(line_number, mapped.document)
            }
            Err(error) => {
                warn!(line = line_number, error = %error, "Skipping record");
                self.fail(FailedRecord::raw(line_number, record.to_line(), FailureKind::Mapping { error }));
                None
            }
        }
    }

    fn fail(&mut self, failure: FailedRecord) {
        self.summary.failures.push(failure);
        if self.fail_fast && !self.cancel.is_cancelled() {
            warn!("Stopping after first failure");
            self.cancel.cancel();
        }
    }

    /// Queue a batch, waiting for space. Returns `false` when the batch could
    /// not be queued because the run is cancelled or the dispatcher is gone.
    async fn dispatch(&mut self, batch: Batch, batches: &mpsc::Sender<Batch>) -> bool {
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = batches.reserve() => permit.ok(),
        };

        match permit {
            Some(permit) => {
                debug!(sequence = batch.sequence, count = batch.len(), "Queued batch");
                permit.send(batch);
                true
            }
            None => {
                self.abandon(batch);
                false
            }
        }
    }

    fn abandon(&mut self, batch: Batch) {
        debug!(sequence = batch.sequence, count = batch.len(), "Batch not submitted");
        for (line, id) in batch.keys() {
            self.summary
                .failures
                .push(FailedRecord::document(line, id, FailureKind::Cancelled));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARIS: &str =
        "1\tParis\tParis\t\t48.8566\t2.3522\tP\tPPLC\tFR\t\t11\t\t\t\t2148000\t35\t42\tEurope/Paris\t2023-01-01\n";

    fn producer(config: &IngestionConfig) -> (RecordProducer, CancellationToken) {
        let cancel = CancellationToken::new();
        (RecordProducer::new(config, cancel.clone(), Arc::new(Notify::new())), cancel)
    }

    async fn collect(mut rx: mpsc::Receiver<Batch>) -> Vec<Batch> {
        let mut batches = Vec::new();
        while let Some(batch) = rx.recv().await {
            batches.push(batch);
        }
        batches
    }

    #[tokio::test]
    async fn test_batches_in_order_with_final_flush() {
        let config = IngestionConfig::default().with_batch_size(2);
        let (producer, _) = producer(&config);
        let input = format!("{}\n{}{}", PARIS, PARIS.replacen('1', "2", 1), PARIS.replacen('1', "3", 1));
        let (tx, rx) = mpsc::channel(8);

        let summary = producer.run(input.as_bytes(), tx).await;
        let batches = collect(rx).await;

        assert_eq!(summary.attempted, 3);
        assert!(summary.failures.is_empty());
        assert_eq!(batches.iter().map(Batch::len).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(batches[0].lines, vec![1, 3]);
        assert_eq!(batches[1].documents[0].id, 3);
    }

    #[tokio::test]
    async fn test_soft_failures_recorded() {
        let config = IngestionConfig::default();
        let (producer, _) = producer(&config);
        let input = format!("abc\tNowhere\n{}", PARIS.replace("48.8566", "north"));
        let (tx, rx) = mpsc::channel(8);

        let summary = producer.run(input.as_bytes(), tx).await;
        let batches = collect(rx).await;

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.warnings, 1);
        assert_eq!(summary.failures.len(), 1);
        assert!(matches!(summary.failures[0].kind, FailureKind::Mapping { .. }));
        assert_eq!(batches.len(), 1);
    }

    #[tokio::test]
    async fn test_fail_fast_cancels() {
        let config = IngestionConfig::default().with_fail_fast(true);
        let (producer, cancel) = producer(&config);
        let input = format!("\u{0}bad\n{}", PARIS);
        let (tx, rx) = mpsc::channel(8);

        let summary = producer.run(input.as_bytes(), tx).await;

        assert!(cancel.is_cancelled());
        assert_eq!(summary.attempted, 1);
        assert!(collect(rx).await.is_empty());
    }

    #[tokio::test]
    async fn test_last_line_without_newline() {
        let config = IngestionConfig::default();
        let (producer, _) = producer(&config);
        let (tx, rx) = mpsc::channel(8);

        let summary = producer.run(PARIS.trim_end().as_bytes(), tx).await;

        assert_eq!(summary.attempted, 1);
        assert_eq!(collect(rx).await[0].documents[0].timezone, "Europe/Paris");
    }
}
