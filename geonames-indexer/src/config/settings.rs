//! Connection settings read from the environment.

use std::env;
use std::time::Duration;

use geonames_indexer_repository::config::{DEFAULT_OPENSEARCH_URL, DEFAULT_REQUEST_TIMEOUT};
use geonames_indexer_repository::OpenSearchConfig;

use crate::IndexingError;

/// Settings that are not part of the command line.
#[derive(Debug, Clone)]
pub struct Settings {
    pub opensearch: OpenSearchConfig,
}

impl Settings {
    /// Read settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `OPENSEARCH_USERNAME`, `OPENSEARCH_PASSWORD`: basic auth, both or neither
    /// - `OPENSEARCH_REQUEST_TIMEOUT_SECS`: per-request timeout (default: 30)
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns the value of a variable if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, IndexingError> {
        let url = lookup("OPENSEARCH_URL").unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string());
        let mut opensearch = OpenSearchConfig::new(url);

        match (lookup("OPENSEARCH_USERNAME"), lookup("OPENSEARCH_PASSWORD")) {
            (Some(username), Some(password)) => {
                opensearch = opensearch.with_credentials(username, password);
            }
            (None, None) => {}
            _ => {
                return Err(IndexingError::config(
                    "OPENSEARCH_USERNAME and OPENSEARCH_PASSWORD must be set together",
                ))
            }
        }

        let timeout = match lookup("OPENSEARCH_REQUEST_TIMEOUT_SECS") {
            Some(value) => value.trim().parse::<u64>().map(Duration::from_secs).map_err(|e| {
                IndexingError::config(format!("Invalid OPENSEARCH_REQUEST_TIMEOUT_SECS '{}': {}", value, e))
            })?,
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        Ok(Self {
            opensearch: opensearch.with_request_timeout(timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, IndexingError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings.opensearch.url, DEFAULT_OPENSEARCH_URL);
        assert!(settings.opensearch.credentials.is_none());
        assert_eq!(settings.opensearch.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("OPENSEARCH_URL", "https://search.internal:9200"),
            ("OPENSEARCH_USERNAME", "admin"),
            ("OPENSEARCH_PASSWORD", "secret"),
            ("OPENSEARCH_REQUEST_TIMEOUT_SECS", "5"),
        ])
        .unwrap();

        assert_eq!(settings.opensearch.url, "https://search.internal:9200");
        assert_eq!(
            settings.opensearch.credentials,
            Some(("admin".to_string(), "secret".to_string()))
        );
        assert_eq!(settings.opensearch.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_partial_credentials_rejected() {
        let result = settings(&[("OPENSEARCH_USERNAME", "admin")]);
        assert!(matches!(result, Err(IndexingError::ConfigError(_))));
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let result = settings(&[("OPENSEARCH_REQUEST_TIMEOUT_SECS", "soon")]);
        assert!(matches!(result, Err(IndexingError::ConfigError(_))));
    }
}
