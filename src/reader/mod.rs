//! Content store access
//!
//! The downstream content store answers batched lookups: one GET with the
//! wanted UUIDs as repeated query parameters, returning a JSON array of the
//! documents it found. UUIDs it does not know are simply absent from the
//! result. Any transport or HTTP level failure means no result at all for
//! that call, never a partial one.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use tracing::warn;

use crate::content::{extract_uuid, Content, ID_FIELD};
use crate::types::{Result, UnrollError};

/// Header carrying the transaction identifier to the content store.
pub const TRANSACTION_ID_HEADER: &str = "X-Request-Id";

/// Fetched documents keyed by UUID.
pub type ContentMap = HashMap<String, Content>;

/// Batched lookup against the content store.
#[async_trait]
pub trait Reader: Send + Sync {
    /// Fetch the given UUIDs in one call via the content endpoint.
    async fn get(&self, uuids: &[String], tid: &str) -> Result<ContentMap>;

    /// Fetch the given UUIDs in one call via the internal content endpoint.
    async fn get_internal(&self, uuids: &[String], tid: &str) -> Result<ContentMap>;
}

/// Configuration for the content store client
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub content_store_app_name: String,
    pub content_store_host: String,
    pub content_path_endpoint: String,
    pub internal_content_path_endpoint: String,
}

/// HTTP client for the content store.
pub struct ContentReader {
    config: ReaderConfig,
    client: Client,
}

impl ContentReader {
    pub fn new(config: ReaderConfig, client: Client) -> Self {
        Self { config, client }
    }

    /// Probe the content store health endpoint. Used by the readiness
    /// check; any non-success status or transport failure is an error.
    pub async fn check_health(&self) -> Result<()> {
        let url = format!("{}/__health", self.config.content_store_host);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(UnrollError::ContentStore(format!(
                "{} health check returned HTTP {}",
                self.config.content_store_app_name,
                response.status()
            )));
        }
        Ok(())
    }

    async fn fetch(&self, endpoint: &str, uuids: &[String], tid: &str) -> Result<ContentMap> {
        if uuids.is_empty() {
            return Ok(ContentMap::new());
        }

        let url = format!("{}{}", self.config.content_store_host, endpoint);
        let query: Vec<(&str, &str)> = uuids.iter().map(|u| ("uuid", u.as_str())).collect();

        let response = self
            .client
            .get(&url)
            .query(&query)
            .header(TRANSACTION_ID_HEADER, tid)
            .send()
            .await
            .map_err(|err| UnrollError::ContentStore(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UnrollError::ContentStore(format!(
                "{} returned HTTP {} for {}",
                self.config.content_store_app_name, status, url
            )));
        }

        let items: Vec<Content> = response
            .json()
            .await
            .map_err(|err| UnrollError::ContentStore(format!("invalid response body: {}", err)))?;

        let mut found = ContentMap::with_capacity(items.len());
        for item in items {
            let Some(id) = item.get_str(ID_FIELD) else {
                warn!(transaction_id = %tid, "Content store returned an item without an id, skipping");
                continue;
            };
            match extract_uuid(id) {
                Ok(uuid) => {
                    found.insert(uuid, item);
                }
                Err(err) => {
                    warn!(transaction_id = %tid, error = %err, "Content store returned an item with an unusable id, skipping");
                }
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl Reader for ContentReader {
    async fn get(&self, uuids: &[String], tid: &str) -> Result<ContentMap> {
        self.fetch(&self.config.content_path_endpoint, uuids, tid).await
    }

    async fn get_internal(&self, uuids: &[String], tid: &str) -> Result<ContentMap> {
        self.fetch(&self.config.internal_content_path_endpoint, uuids, tid)
            .await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const UUID_1: &str = "639cd952-149f-11e7-2ea7-a07ecd9ac73f";
    const UUID_2: &str = "71231d3a-13c7-11e7-2ea7-a07ecd9ac73f";
    const MISSING: &str = "d02886fc-58ff-11e8-9859-6668838a4c10";

    fn reader_for(server_uri: &str) -> ContentReader {
        ContentReader::new(
            ReaderConfig {
                content_store_app_name: "content-source-app-name".to_string(),
                content_store_host: server_uri.to_string(),
                content_path_endpoint: "/content".to_string(),
                internal_content_path_endpoint: "/internalcontent".to_string(),
            },
            Client::new(),
        )
    }

    fn uuids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_get_keys_results_by_uuid_and_drops_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": format!("http://www.ft.com/thing/{}", UUID_1), "type": "Image"},
                {"id": format!("http://www.ft.com/thing/{}", UUID_2), "type": "Image"},
            ])))
            .mount(&server)
            .await;

        let reader = reader_for(&server.uri());
        let found = reader
            .get(&uuids(&[UUID_1, UUID_2, MISSING]), "tid_test")
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert!(found.contains_key(UUID_1));
        assert!(found.contains_key(UUID_2));
        assert!(!found.contains_key(MISSING));
    }

    #[tokio::test]
    async fn test_get_empty_uuid_list_issues_no_request() {
        // No mock mounted: a request would fail the test with a connection
        // to a server expecting zero calls.
        let server = MockServer::start().await;
        let reader = reader_for(&server.uri());
        let found = reader.get(&[], "tid_test").await.unwrap();
        assert!(found.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_propagates_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let reader = reader_for(&server.uri());
        let err = reader.get(&uuids(&[UUID_1]), "tid_test").await.unwrap_err();
        assert!(matches!(err, UnrollError::ContentStore(_)));
    }

    #[tokio::test]
    async fn test_get_treats_not_found_status_as_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let reader = reader_for(&server.uri());
        assert!(reader.get(&uuids(&[UUID_1]), "tid_test").await.is_err());
    }

    #[tokio::test]
    async fn test_get_unresolvable_host_is_an_error() {
        let reader = reader_for("http://localhost:1");
        assert!(reader.get(&uuids(&[UUID_1]), "tid_test").await.is_err());
    }

    #[tokio::test]
    async fn test_get_internal_uses_internal_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/internalcontent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": format!("http://www.ft.com/thing/{}", UUID_1)},
            ])))
            .mount(&server)
            .await;

        let reader = reader_for(&server.uri());
        let found = reader.get_internal(&uuids(&[UUID_1]), "tid_test").await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains_key(UUID_1));
    }

    #[tokio::test]
    async fn test_check_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/__health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let reader = reader_for(&server.uri());
        assert!(reader.check_health().await.is_ok());

        let failing = reader_for("http://localhost:1");
        assert!(failing.check_health().await.is_err());
    }
}
