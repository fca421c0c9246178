//! Search index error types.
//!
//! This module defines the error types that can occur during search index operations.

use thiserror::Error;

/// HTTP statuses that indicate a temporary backend condition.
const TRANSIENT_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// Errors that can occur during search index operations.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Validation error (e.g., an illegal index name).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to reach the search engine.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The search engine is temporarily unable to serve the request.
    #[error("Transient backend error (status {status}): {reason}")]
    TransientError { status: u16, reason: String },

    /// The search engine rejected the request.
    #[error("Request rejected (status {status}): {reason}")]
    RejectedError { status: u16, reason: String },

    /// Failed to create or delete the search index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// Failed to serialize data for the search engine.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Failed to parse a response from the search engine.
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl SearchIndexError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Classify an unsuccessful HTTP response.
    pub fn from_status(status: u16, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        if TRANSIENT_STATUSES.contains(&status) {
            Self::TransientError { status, reason }
        } else {
            Self::RejectedError { status, reason }
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionError(_) | Self::TransientError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        assert!(SearchIndexError::from_status(429, "too many requests").is_retryable());
        assert!(SearchIndexError::from_status(503, "unavailable").is_retryable());
        assert!(!SearchIndexError::from_status(400, "mapper_parsing_exception").is_retryable());
        assert!(!SearchIndexError::from_status(404, "index_not_found_exception").is_retryable());
    }

    #[test]
    fn test_connection_errors_are_retryable() {
        assert!(SearchIndexError::connection("refused").is_retryable());
        assert!(!SearchIndexError::validation("bad").is_retryable());
        assert!(!SearchIndexError::parse("garbage").is_retryable());
    }

    #[test]
    fn test_display() {
        let err = SearchIndexError::from_status(503, "unavailable");
        assert_eq!(
            err.to_string(),
            "Transient backend error (status 503): unavailable"
        );
    }
}
