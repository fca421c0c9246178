//! Ingestion report.
//!
//! Counts and failure details collected while a pipeline runs.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::errors::{MappingError, ParseError};

/// Why a record or document ended in a failure state.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// The line could not be split into fields.
    #[error("{error}")]
    Parse { error: ParseError },

    /// The record could not be turned into a document.
    #[error("{error}")]
    Mapping { error: MappingError },

    /// The backend rejected the document or the whole request.
    #[error("Rejected by backend: {reason}")]
    Rejected { reason: String },

    /// Transient backend failures persisted through every attempt.
    #[error("Retries exhausted: {reason}")]
    RetriesExhausted { reason: String },

    /// The pipeline stopped before the document was acknowledged.
    #[error("Cancelled")]
    Cancelled,
}

/// What a failure entry refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureSubject {
    /// The source line, for records that never became documents.
    Raw(String),
    /// The document id.
    GeonameId(u64),
}

/// One failed record or document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRecord {
    /// 1-based line number in the source.
    pub line: u64,
    pub subject: FailureSubject,
    pub kind: FailureKind,
}

impl FailedRecord {
    pub fn raw(line: u64, raw: impl Into<String>, kind: FailureKind) -> Self {
        Self {
            line,
            subject: FailureSubject::Raw(raw.into()),
            kind,
        }
    }

    pub fn document(line: u64, id: u64, kind: FailureKind) -> Self {
        Self {
            line,
            subject: FailureSubject::GeonameId(id),
            kind,
        }
    }
}

/// Final outcome of an ingestion run.
///
/// Every consumed record is accounted for exactly once, so
/// `attempted == succeeded + failed` holds for a finished report.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    /// Target index name.
    pub index: String,
    /// Non-blank lines consumed from the source.
    pub attempted: u64,
    /// Documents acknowledged by the backend.
    pub succeeded: u64,
    /// Records that failed at any stage, including cancelled ones.
    pub failed: u64,
    /// Fields that were coerced to a default value.
    pub warnings: u64,
    /// Bulk requests that completed.
    pub batches: u64,
    /// Additional bulk requests caused by retries and resubmissions.
    pub retries: u64,
    /// Whether the run was cancelled before the input was exhausted.
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Failure details ordered by source line.
    pub failures: Vec<FailedRecord>,
}

impl IngestionReport {
    /// Whether every attempted record was indexed.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failed == 0 && self.succeeded == self.attempted
    }

    /// Whether the number of failures is above `max_failures`.
    pub fn exceeds_failure_threshold(&self, max_failures: u64) -> bool {
        self.failed > max_failures
    }

    /// Number of failures of each kind: parse, mapping, rejected, retries exhausted, cancelled.
    pub fn failure_breakdown(&self) -> [(&'static str, usize); 5] {
        let count = |f: fn(&FailureKind) -> bool| self.failures.iter().filter(|r| f(&r.kind)).count();
        [
            ("parse", count(|k| matches!(k, FailureKind::Parse { .. }))),
            ("mapping", count(|k| matches!(k, FailureKind::Mapping { .. }))),
            ("rejected", count(|k| matches!(k, FailureKind::Rejected { .. }))),
            ("retries_exhausted", count(|k| matches!(k, FailureKind::RetriesExhausted { .. }))),
            ("cancelled", count(|k| matches!(k, FailureKind::Cancelled))),
        ]
    }
}

impl fmt::Display for IngestionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = self.finished_at - self.started_at;
        writeln!(
            f,
            "Index '{}': {} attempted, {} succeeded, {} failed, {} warnings{}",
            self.index,
            self.attempted,
            self.succeeded,
            self.failed,
            self.warnings,
            if self.cancelled { " (cancelled)" } else { "" }
        )?;
        write!(
            f,
            "{} batches, {} retries in {:.1}s",
            self.batches,
            self.retries,
            elapsed.num_milliseconds() as f64 / 1000.0
        )?;
        for (kind, count) in self.failure_breakdown() {
            if count > 0 {
                write!(f, "\n  {}: {}", kind, count)?;
            }
        }
        Ok(())
    }
}

/// Mutable side of the report, owned by the coordinator while it runs.
#[derive(Debug)]
pub(crate) struct ReportAccumulator {
    index: String,
    attempted: u64,
    succeeded: u64,
    warnings: u64,
    batches: u64,
    retries: u64,
    failures: Vec<FailedRecord>,
    started_at: DateTime<Utc>,
}

impl ReportAccumulator {
    pub(crate) fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            attempted: 0,
            succeeded: 0,
            warnings: 0,
            batches: 0,
            retries: 0,
            failures: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub(crate) fn record_attempted(&mut self, count: u64) {
        self.attempted += count;
    }

    pub(crate) fn record_warnings(&mut self, count: u64) {
        self.warnings += count;
    }

    pub(crate) fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub(crate) fn record_failure(&mut self, failure: FailedRecord) {
        self.failures.push(failure);
    }

    pub(crate) fn record_batch(&mut self, retries: u64) {
        self.batches += 1;
        self.retries += retries;
    }

    pub(crate) fn finish(mut self, cancelled: bool) -> IngestionReport {
        self.failures.sort_by_key(|failure| failure.line);

        IngestionReport {
            index: self.index,
            attempted: self.attempted,
            succeeded: self.succeeded,
            failed: self.failures.len() as u64,
            warnings: self.warnings,
            batches: self.batches,
            retries: self.retries,
            cancelled,
            started_at: self.started_at,
            finished_at: Utc::now(),
            failures: self.failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_orders_failures_by_line() {
        let mut report = ReportAccumulator::new("geonames");
        report.record_attempted(4);
        report.record_success();
        report.record_failure(FailedRecord::document(9, 90, FailureKind::Cancelled));
        report.record_failure(FailedRecord::raw(
            2,
            "x",
            FailureKind::Parse {
                error: ParseError::malformed("bad"),
            },
        ));
        report.record_failure(FailedRecord::document(
            5,
            50,
            FailureKind::Rejected {
                reason: "mapper_parsing_exception".to_string(),
            },
        ));

        let report = report.finish(false);

        assert_eq!(report.attempted, 4);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 3);
        let lines: Vec<u64> = report.failures.iter().map(|f| f.line).collect();
        assert_eq!(lines, vec![2, 5, 9]);
        assert!(!report.is_complete());
        assert!(report.exceeds_failure_threshold(2));
        assert!(!report.exceeds_failure_threshold(3));
    }

    #[test]
    fn test_complete_report() {
        let mut report = ReportAccumulator::new("geonames");
        report.record_attempted(1);
        report.record_success();
        report.record_batch(0);

        let report = report.finish(false);
        assert!(report.is_complete());
        assert!(report.to_string().starts_with(
            "Index 'geonames': 1 attempted, 1 succeeded, 0 failed, 0 warnings"
        ));
    }

    #[test]
    fn test_serialized_failure_shape() {
        let failure = FailedRecord::document(
            3,
            42,
            FailureKind::RetriesExhausted {
                reason: "503".to_string(),
            },
        );

        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["line"], 3);
        assert_eq!(value["subject"]["geoname_id"], 42);
        assert_eq!(value["kind"]["kind"], "retries_exhausted");
    }
}
