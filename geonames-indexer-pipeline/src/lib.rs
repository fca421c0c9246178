//! # GeoNames Indexer Pipeline
//!
//! This crate provides the pipeline that streams a GeoNames dump into a
//! search index.
//!
//! ## Architecture
//!
//! The pipeline follows the Parser-Processor-Accumulator-Loader pattern:
//!
//! 1. **Parser**: Splits each tab-separated line into a raw record
//! 2. **Processor**: Maps raw records into typed documents
//! 3. **Accumulator**: Groups documents into bounded batches
//! 4. **Loader**: Bulk-upserts batches with retries and per-document accounting
//! 5. **Orchestrator**: Drives the flow with bounded concurrency and collects the report

pub mod accumulator;
pub mod errors;
pub mod loader;
pub mod orchestrator;
pub mod parser;
pub mod processor;
pub mod report;

pub use errors::{MappingError, ParseError, PipelineError};
pub use orchestrator::{IngestionConfig, IngestionCoordinator, IngestionState};
pub use loader::{BulkIndexer, LoaderConfig};
pub use report::{FailedRecord, FailureKind, FailureSubject, IngestionReport};
