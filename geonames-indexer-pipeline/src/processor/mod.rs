//! Processor module for the GeoNames indexer pipeline.
//!
//! Transforms raw records into search documents.

mod document_mapper;

pub use document_mapper::{DocumentMapper, FieldWarning, MappedDocument};
