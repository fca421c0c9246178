//! # GeoNames Indexer
//!
//! Main library for the GeoNames indexer.
//!
//! This crate provides the configuration and wiring used by the
//! `geonames-indexer` binary to run the ingestion pipeline.

pub mod config;

pub use config::{Dependencies, Settings};

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The source file could not be opened.
    #[error("Impossible to open file {}: {source}", path.display())]
    SourceError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] geonames_indexer_pipeline::PipelineError),

    /// Search error.
    #[error("Search error: {0}")]
    SearchError(#[from] geonames_indexer_repository::SearchIndexError),

    /// Report serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create an error for a source file that cannot be opened.
    pub fn source_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SourceError {
            path: path.into(),
            source,
        }
    }
}
