//! In-memory search backend shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use geonames_indexer_pipeline::IngestionReport;
use geonames_indexer_repository::{BulkIndexProvider, BulkItemResult, BulkResponse, IndexName, SearchIndexError};
use geonames_indexer_shared::GeonameDocument;
use serde_json::Value;

pub const PARIS: &str =
    "1\tParis\tParis\t\t48.8566\t2.3522\tP\tPPLC\tFR\t\t11\t\t\t\t2148000\t35\t42\tEurope/Paris\t2023-01-01\n";

/// A well-formed line for `id`.
pub fn line(id: u64) -> String {
    format!(
        "{id}\tPlace {id}\tPlace {id}\tAlt {id},Other {id}\t10.5\t20.25\tP\tPPL\tFR\t\t11\t\t\t\t{id}\t0\t0\tEurope/Paris\t2024-02-01\n"
    )
}

/// `count` well-formed lines with ids starting at 1.
pub fn lines(count: u64) -> String {
    (1..=count).map(line).collect()
}

/// Scripted reply for the next bulk request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Fail the whole request.
    Fail(SearchIndexError),
    /// Answer 429 for these ids and store the rest.
    Throttle(Vec<u64>),
    /// Answer 400 for these ids and store the rest.
    Reject(Vec<u64>),
}

/// Backend that stores documents per index in memory and answers bulk
/// requests from an optional script.
#[derive(Default)]
pub struct InMemoryBackend {
    indices: Mutex<HashMap<String, HashMap<u64, Value>>>,
    script: Mutex<VecDeque<Reply>>,
    bulk_calls: AtomicUsize,
    latency: Option<Duration>,
    unhealthy: bool,
    health_error: Option<SearchIndexError>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(replies: Vec<Reply>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    /// Every bulk request waits this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Report the cluster as reachable but unhealthy.
    pub fn unhealthy(mut self) -> Self {
        self.unhealthy = true;
        self
    }

    /// Fail health checks with `error`, as an unreachable cluster would.
    pub fn unreachable(mut self, error: SearchIndexError) -> Self {
        self.health_error = Some(error);
        self
    }

    pub fn bulk_calls(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    pub fn document_count(&self, index: &str) -> usize {
        self.indices.lock().unwrap().get(index).map_or(0, HashMap::len)
    }

    pub fn document(&self, index: &str, id: u64) -> Option<Value> {
        self.indices.lock().unwrap().get(index)?.get(&id).cloned()
    }
}

#[async_trait]
impl BulkIndexProvider for InMemoryBackend {
    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        match &self.health_error {
            Some(error) => Err(error.clone()),
            None => Ok(!self.unhealthy),
        }
    }

    async fn index_exists(&self, index: &IndexName) -> Result<bool, SearchIndexError> {
        Ok(self.indices.lock().unwrap().contains_key(index.as_str()))
    }

    async fn create_index(&self, index: &IndexName, _settings: &Value) -> Result<(), SearchIndexError> {
        self.indices
            .lock()
            .unwrap()
            .insert(index.as_str().to_string(), HashMap::new());
        Ok(())
    }

    async fn delete_index(&self, index: &IndexName) -> Result<(), SearchIndexError> {
        self.indices.lock().unwrap().remove(index.as_str());
        Ok(())
    }

    async fn bulk_upsert(
        &self,
        index: &IndexName,
        documents: &[GeonameDocument],
    ) -> Result<BulkResponse, SearchIndexError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let reply = self.script.lock().unwrap().pop_front();
        let (throttled, rejected) = match reply {
            Some(Reply::Fail(e)) => return Err(e),
            Some(Reply::Throttle(ids)) => (ids, Vec::new()),
            Some(Reply::Reject(ids)) => (Vec::new(), ids),
            None => (Vec::new(), Vec::new()),
        };

        let mut indices = self.indices.lock().unwrap();
        let stored = indices.entry(index.as_str().to_string()).or_default();

        let items = documents
            .iter()
            .map(|doc| {
                if throttled.contains(&doc.id) {
                    BulkItemResult::failed(doc.id, 429, "es_rejected_execution_exception", "queue is full")
                } else if rejected.contains(&doc.id) {
                    BulkItemResult::failed(doc.id, 400, "mapper_parsing_exception", "failed to parse field")
                } else {
                    let created = stored
                        .insert(doc.id, serde_json::to_value(doc).unwrap())
                        .is_none();
                    BulkItemResult::ok(doc.id, if created { 201 } else { 200 })
                }
            })
            .collect();

        Ok(BulkResponse { took_ms: 1, items })
    }
}

/// Every attempted record is either indexed or failed, exactly once.
pub fn assert_accounted(report: &IngestionReport) {
    assert_eq!(report.attempted, report.succeeded + report.failed, "{report}");
    assert_eq!(report.failed, report.failures.len() as u64);
    assert!(report.failures.windows(2).all(|w| w[0].line <= w[1].line));
}
