//! Parser module for the GeoNames indexer pipeline.
//!
//! Splits raw input lines into positional records.

mod record_parser;

pub use record_parser::RecordParser;
pub(crate) use record_parser::strip_line_ending;
