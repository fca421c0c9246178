//! Request and response types for bulk index operations.

use std::fmt;

use crate::errors::SearchIndexError;

/// Characters OpenSearch does not allow in index names.
const FORBIDDEN_INDEX_CHARS: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ' ', ',', '#', ':'];

/// Maximum index name length in bytes.
const MAX_INDEX_NAME_BYTES: usize = 255;

/// A validated search index name.
///
/// Follows the OpenSearch naming rules: lowercase, no path or wildcard
/// characters, not starting with `-`, `_` or `+`, and not `.` or `..`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexName(String);

impl IndexName {
    /// Validate `name` as an index name.
    pub fn parse(name: impl Into<String>) -> Result<Self, SearchIndexError> {
        let name = name.into();

        if name.is_empty() {
            return Err(SearchIndexError::validation("index name must not be empty"));
        }
        if name.len() > MAX_INDEX_NAME_BYTES {
            return Err(SearchIndexError::validation(format!(
                "index name is longer than {} bytes",
                MAX_INDEX_NAME_BYTES
            )));
        }
        if name == "." || name == ".." {
            return Err(SearchIndexError::validation(format!(
                "'{}' is not a valid index name",
                name
            )));
        }
        if name.starts_with(['-', '_', '+']) {
            return Err(SearchIndexError::validation(format!(
                "index name '{}' must not start with '-', '_' or '+'",
                name
            )));
        }
        if name.chars().any(|c| c.is_uppercase()) {
            return Err(SearchIndexError::validation(format!(
                "index name '{}' must be lowercase",
                name
            )));
        }
        if let Some(c) = name.chars().find(|c| FORBIDDEN_INDEX_CHARS.contains(c)) {
            return Err(SearchIndexError::validation(format!(
                "index name '{}' contains forbidden character {:?}",
                name, c
            )));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error details reported for a single bulk item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemError {
    /// Error type as reported by the engine, e.g. `mapper_parsing_exception`.
    pub error_type: String,
    /// Human readable reason.
    pub reason: String,
}

/// Outcome of a single document within a bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemResult {
    /// The document id the item refers to.
    pub id: u64,
    /// HTTP status of the item.
    pub status: u16,
    /// Error details, present on failure.
    pub error: Option<BulkItemError>,
}

impl BulkItemResult {
    /// An item that was created or replaced.
    pub fn ok(id: u64, status: u16) -> Self {
        Self {
            id,
            status,
            error: None,
        }
    }

    /// A failed item.
    pub fn failed(id: u64, status: u16, error_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id,
            status,
            error: Some(BulkItemError {
                error_type: error_type.into(),
                reason: reason.into(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }

    /// Whether this single item was refused for load reasons and may be sent again.
    pub fn is_retryable(&self) -> bool {
        if self.is_success() {
            return false;
        }
        self.status == 429
            || self
                .error
                .as_ref()
                .is_some_and(|e| e.error_type.ends_with("rejected_execution_exception"))
    }

    /// Failure reason suitable for reports.
    pub fn reason(&self) -> String {
        match &self.error {
            Some(error) => format!("{}: {}", error.error_type, error.reason),
            None => format!("status {}", self.status),
        }
    }
}

/// Per-item results of a bulk request, in request order.
#[derive(Debug, Clone, Default)]
pub struct BulkResponse {
    /// Server-side processing time in milliseconds.
    pub took_ms: u64,
    /// One entry per submitted document.
    pub items: Vec<BulkItemResult>,
}

impl BulkResponse {
    /// Number of items that succeeded.
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|item| item.is_success()).count()
    }

    /// Number of items that failed.
    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }

    pub fn has_errors(&self) -> bool {
        self.failed() > 0
    }
}
