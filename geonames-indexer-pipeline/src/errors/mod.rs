//! Error types for the GeoNames indexer pipeline.

use geonames_indexer_repository::SearchIndexError;
use serde::Serialize;
use thiserror::Error;

/// Errors that stop the pipeline as a whole.
///
/// Problems with individual records or documents are not reported through
/// this type; they are recorded in the `IngestionReport`.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Reading the source failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the search engine outside of document indexing.
    #[error("Search error: {0}")]
    SearchError(#[from] SearchIndexError),

    /// The search engine answered but reports itself as unhealthy.
    #[error("Search engine is unhealthy")]
    BackendUnhealthy,

    /// A pipeline task failed or a channel closed unexpectedly.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// `run` was called on a coordinator that already ran.
    #[error("Ingestion already started")]
    AlreadyStarted,
}

impl PipelineError {
    /// Create a channel error.
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelError(msg.into())
    }
}

/// Errors produced while splitting a line into fields.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "reason", rename_all = "snake_case")]
pub enum ParseError {
    /// The line could not be tokenized, e.g. an unterminated quoted field.
    #[error("Malformed line: {0}")]
    MalformedLine(String),

    /// The line is not valid UTF-8.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),
}

impl ParseError {
    /// Create a malformed line error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedLine(msg.into())
    }
}

/// Errors produced while turning a raw record into a document.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MappingError {
    /// The id column is not a non-negative integer.
    #[error("Invalid geonameId {value:?}: {reason}")]
    InvalidId { value: String, reason: String },
}
