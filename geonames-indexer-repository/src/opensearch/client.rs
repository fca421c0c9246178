//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `BulkIndexProvider`
//! using the OpenSearch Rust client.

use async_trait::async_trait;
use opensearch::{
    auth::Credentials,
    cluster::ClusterHealthParts,
    http::{
        request::JsonBody,
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
    indices::{IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts},
    BulkParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::OpenSearchConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::BulkIndexProvider;
use crate::types::{BulkItemResult, BulkResponse, IndexName};
use geonames_indexer_shared::GeonameDocument;

/// OpenSearch client implementation.
///
/// # Example
///
/// ```ignore
/// use geonames_indexer_repository::{IndexName, OpenSearchClient, OpenSearchConfig};
///
/// let client = OpenSearchClient::new(&OpenSearchConfig::new("http://localhost:9200"))?;
/// let index = IndexName::parse("geonames")?;
///
/// // Creates the documents or replaces them if their ids already exist
/// let response = client.bulk_upsert(&index, &documents).await?;
/// println!("{} indexed, {} failed", response.succeeded(), response.failed());
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client from the given configuration.
    ///
    /// No request is sent; use `health_check` to verify the cluster is reachable.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchIndexError)` - If the URL is invalid or transport setup fails
    pub fn new(config: &OpenSearchConfig) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(&config.url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let mut builder = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(config.request_timeout);

        if let Some((username, password)) = &config.credentials {
            builder = builder.auth(Credentials::Basic(username.clone(), password.clone()));
        }

        let transport = builder
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        info!(
            url = %config.url,
            authenticated = config.credentials.is_some(),
            "Created OpenSearch client"
        );

        Ok(Self {
            client: OpenSearch::new(transport),
        })
    }

    /// Build the NDJSON body of a bulk request: one `index` action line
    /// followed by the document source, per document.
    fn bulk_body(documents: &[GeonameDocument]) -> Result<Vec<JsonBody<Value>>, SearchIndexError> {
        let mut body = Vec::with_capacity(documents.len() * 2);

        for document in documents {
            let source = serde_json::to_value(document)
                .map_err(|e| SearchIndexError::serialization(e.to_string()))?;
            body.push(json!({ "index": { "_id": document.id.to_string() } }).into());
            body.push(source.into());
        }

        Ok(body)
    }

    /// Parse a bulk response body into per-document results.
    ///
    /// Items are matched to `documents` by position, which is how the bulk API
    /// orders them. A response with fewer items than documents is treated as
    /// a failure for the missing tail rather than as a parse error.
    fn parse_bulk_response(
        documents: &[GeonameDocument],
        body: &Value,
    ) -> Result<BulkResponse, SearchIndexError> {
        let items = body["items"]
            .as_array()
            .ok_or_else(|| SearchIndexError::parse("bulk response has no items array"))?;

        if items.len() != documents.len() {
            warn!(
                expected = documents.len(),
                received = items.len(),
                "Bulk response item count does not match request"
            );
        }

        let results = documents
            .iter()
            .enumerate()
            .map(|(position, document)| match items.get(position) {
                Some(item) => Self::parse_item(document.id, item),
                None => BulkItemResult::failed(
                    document.id,
                    500,
                    "missing_item",
                    "no result for document in bulk response",
                ),
            })
            .collect();

        Ok(BulkResponse {
            took_ms: body["took"].as_u64().unwrap_or(0),
            items: results,
        })
    }

    /// Parse one `{"index": {...}}` entry of a bulk response.
    fn parse_item(id: u64, item: &Value) -> BulkItemResult {
        let action = &item["index"];
        let status = action["status"].as_u64().unwrap_or(500) as u16;

        match action.get("error") {
            None | Some(Value::Null) => BulkItemResult::ok(id, status),
            Some(error) => BulkItemResult::failed(
                id,
                status,
                error["type"].as_str().unwrap_or("unknown"),
                error["reason"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string()),
            ),
        }
    }
}

#[async_trait]
impl BulkIndexProvider for OpenSearchClient {
    /// Query cluster health. A `red` cluster is reported as unhealthy.
    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(SearchIndexError::from_status(status.as_u16(), error_body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let cluster_status = body["status"].as_str().unwrap_or("red");
        debug!(status = %cluster_status, "Cluster health");

        Ok(cluster_status != "red")
    }

    async fn index_exists(&self, index: &IndexName) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index.as_str()]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        match response.status_code().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(SearchIndexError::from_status(
                status,
                format!("unexpected status checking index {}", index),
            )),
        }
    }

    #[instrument(skip(self, settings), fields(index = %index))]
    async fn create_index(&self, index: &IndexName, settings: &Value) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index.as_str()))
            .body(settings.clone())
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Create index request failed");
            return Err(SearchIndexError::index_creation(format!(
                "Create index failed with status {}: {}",
                status, error_body
            )));
        }

        info!("Index created");
        Ok(())
    }

    #[instrument(skip(self), fields(index = %index))]
    async fn delete_index(&self, index: &IndexName) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[index.as_str()]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();

        // 404 is acceptable - index may not exist
        if !status.is_success() && status.as_u16() != 404 {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Delete index request failed");
            return Err(SearchIndexError::index_creation(format!(
                "Delete index failed with status {}: {}",
                status, error_body
            )));
        }

        info!("Index deleted");
        Ok(())
    }

    /// Upsert documents with the `_bulk` API using `index` actions keyed by
    /// the GeoNames id, so a repeated submission replaces the stored document.
    async fn bulk_upsert(
        &self,
        index: &IndexName,
        documents: &[GeonameDocument],
    ) -> Result<BulkResponse, SearchIndexError> {
        if documents.is_empty() {
            return Ok(BulkResponse::default());
        }

        let body = Self::bulk_body(documents)?;

        let response = self
            .client
            .bulk(BulkParts::Index(index.as_str()))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %error_body, "Bulk request failed");
            return Err(SearchIndexError::from_status(status.as_u16(), error_body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let result = Self::parse_bulk_response(documents, &body)?;

        debug!(
            count = documents.len(),
            failed = result.failed(),
            took_ms = result.took_ms,
            "Bulk request completed"
        );
        Ok(result)
    }
}
