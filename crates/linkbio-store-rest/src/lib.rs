// # REST Document Store
//
// This crate provides a DocumentStore implementation backed by a REST/JSON
// document API.
//
// ## Behavior
//
// - One HTTP request per port call
// - Errors are propagated as-is; retries belong to the caller
// - HTTP timeout configured (30 seconds by default)
// - Specific error handling for HTTP status codes (401/403, 404, 409, 429, 5xx)
// - Dry-run mode: reads hit the API, writes are only logged
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - Store construction fails fast if the token is empty
//
// ## API Reference
//
// - Get document: GET `{base}/documents/{path}` -> `{"id", "fields"}` or 404
// - Write document: PUT `{base}/documents/{path}?merge={bool}` with the fields as body
// - Create document: POST `{base}/documents/{collection}` -> `{"id"}`
// - Delete document: DELETE `{base}/documents/{path}`
// - Query collection: GET `{base}/documents/{collection}[?field=..&value=..]`
//   -> `{"documents": [...]}`

use async_trait::async_trait;
use linkbio_core::config::DocumentStoreConfig;
use linkbio_core::model::{CollectionPath, Document, DocumentPath, Fields, Filter, WriteMode};
use linkbio_core::traits::{DocumentStore, DocumentStoreFactory};
use linkbio_core::{Error, Result};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const STORE_NAME: &str = "rest";

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<Document>,
}

/// REST/JSON document store
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the store will:
/// - Perform all GET requests (documents, queries)
/// - Log the intended PUT/POST/DELETE
/// - **NOT** actually modify any document
///
/// Creates return a placeholder id prefixed with `dry-run-`.
pub struct RestDocumentStore {
    /// Base URL of the document API
    base_url: Url,

    /// Bearer token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform reads but skip writes
    dry_run: bool,

    /// Counter for placeholder ids in dry-run mode
    dry_run_ids: AtomicU64,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for RestDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestDocumentStore")
            .field("base_url", &self.base_url.as_str())
            .field("api_token", &"<REDACTED>")
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl RestDocumentStore {
    /// Create a new REST document store
    ///
    /// # Parameters
    ///
    /// - `base_url`: API base URL, e.g. `https://db.example.com/v1`
    /// - `api_token`: Bearer token with read/write access
    /// - `timeout`: Per-request HTTP timeout
    /// - `dry_run`: If true, perform reads but skip writes
    pub fn new(
        base_url: &str,
        api_token: impl Into<String>,
        timeout: Duration,
        dry_run: bool,
    ) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("REST store API token cannot be empty"));
        }

        let base_url = Url::parse(base_url)
            .map_err(|e| Error::config(format!("Invalid REST store base URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!(
                "REST store base URL cannot have paths appended: {}",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            api_token,
            client,
            dry_run,
            dry_run_ids: AtomicU64::new(0),
        })
    }

    /// Whether writes are skipped
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// URL of a document or collection path
    fn documents_url(&self, path: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::config("REST store base URL cannot be a base"))?;
            segments.pop_if_empty().push("documents");
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        request
            .send()
            .await
            .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| Error::store(STORE_NAME, format!("Failed to parse response: {}", e)))
    }

    fn next_dry_run_id(&self) -> String {
        format!("dry-run-{}", self.dry_run_ids.fetch_add(1, Ordering::SeqCst))
    }
}

/// Map a non-success response to an error
async fn status_error(response: reqwest::Response, context: &str) -> Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());
    map_status(status, &body, context)
}

fn map_status(status: StatusCode, body: &str, context: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{}: invalid API token or insufficient permissions. Status: {}",
            context, status
        )),
        404 => Error::not_found(format!("{}: {}", context, status)),
        409 => Error::store(
            STORE_NAME,
            format!("{}: conflicting write. Status: {}", context, status),
        ),
        429 => Error::rate_limited(format!(
            "{}: rate limit exceeded. Status: {}",
            context, status
        )),
        500..=599 => Error::store(
            STORE_NAME,
            format!("{}: server error (transient): {} - {}", context, status, body),
        ),
        _ => Error::store(STORE_NAME, format!("{}: {} - {}", context, status, body)),
    }
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        let url = self.documents_url(path.as_str())?;
        tracing::debug!("GET document {}", path);

        let response = self.send(self.request(Method::GET, url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(response, &format!("Failed to read {}", path)).await);
        }

        let document: Document = Self::parse(response).await?;
        Ok(Some(document))
    }

    async fn set(&self, path: &DocumentPath, fields: Fields, mode: WriteMode) -> Result<()> {
        let merge = mode == WriteMode::Merge;
        if self.dry_run {
            let count = fields.len();
            tracing::info!(
                "[DRY-RUN] Would PUT {} (merge={}) with {} field(s): {}",
                path,
                merge,
                count,
                serde_json::Value::Object(fields)
            );
            return Ok(());
        }

        let mut url = self.documents_url(path.as_str())?;
        url.query_pairs_mut()
            .append_pair("merge", if merge { "true" } else { "false" });

        let response = self
            .send(self.request(Method::PUT, url).json(&fields))
            .await?;
        if !response.status().is_success() {
            return Err(status_error(response, &format!("Failed to write {}", path)).await);
        }

        tracing::debug!("Wrote {} (merge={})", path, merge);
        Ok(())
    }

    async fn create(&self, collection: &CollectionPath, fields: Fields) -> Result<String> {
        if self.dry_run {
            let id = self.next_dry_run_id();
            tracing::info!(
                "[DRY-RUN] Would POST to {} with {} field(s), placeholder id {}",
                collection,
                fields.len(),
                id
            );
            return Ok(id);
        }

        let url = self.documents_url(collection.as_str())?;
        let response = self
            .send(self.request(Method::POST, url).json(&fields))
            .await?;
        if !response.status().is_success() {
            return Err(
                status_error(response, &format!("Failed to create in {}", collection)).await,
            );
        }

        let created: CreatedResponse = Self::parse(response).await?;
        tracing::debug!("Created {}/{}", collection, created.id);
        Ok(created.id)
    }

    async fn delete(&self, path: &DocumentPath) -> Result<()> {
        if self.dry_run {
            tracing::info!("[DRY-RUN] Would DELETE {}", path);
            return Ok(());
        }

        let url = self.documents_url(path.as_str())?;
        let response = self.send(self.request(Method::DELETE, url)).await?;
        // Already gone
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(status_error(response, &format!("Failed to delete {}", path)).await);
        }

        tracing::debug!("Deleted {}", path);
        Ok(())
    }

    async fn query(&self, collection: &CollectionPath, filter: &Filter) -> Result<Vec<Document>> {
        let mut url = self.documents_url(collection.as_str())?;
        if let Filter::FieldEquals { field, value } = filter {
            url.query_pairs_mut()
                .append_pair("field", field)
                .append_pair("value", &value.to_string());
        }
        tracing::debug!("GET collection {}", collection);

        let response = self.send(self.request(Method::GET, url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(status_error(response, &format!("Failed to query {}", collection)).await);
        }

        let listed: QueryResponse = Self::parse(response).await?;
        Ok(listed.documents)
    }

    fn store_name(&self) -> &'static str {
        STORE_NAME
    }
}

/// Factory for creating REST document stores
pub struct RestDocumentStoreFactory;

impl DocumentStoreFactory for RestDocumentStoreFactory {
    fn create(&self, config: &DocumentStoreConfig) -> Result<Box<dyn DocumentStore>> {
        match config {
            DocumentStoreConfig::Rest {
                base_url,
                api_token,
                timeout_secs,
                dry_run,
            } => {
                if api_token.is_empty() {
                    return Err(Error::config("REST store API token is required"));
                }

                // LINKBIO_MODE=dry-run forces dry-run regardless of config
                let dry_run = *dry_run
                    || std::env::var("LINKBIO_MODE")
                        .unwrap_or_default()
                        .eq_ignore_ascii_case("dry-run");

                if dry_run {
                    tracing::warn!(
                        "REST document store running in DRY-RUN mode - no changes will be made"
                    );
                }

                Ok(Box::new(RestDocumentStore::new(
                    base_url,
                    api_token.clone(),
                    Duration::from_secs(*timeout_secs),
                    dry_run,
                )?))
            }
            _ => Err(Error::config("Invalid config for REST document store")),
        }
    }
}

/// Register the REST document store with a registry
///
/// # Example
///
/// ```rust
/// use linkbio_core::StoreRegistry;
///
/// let registry = StoreRegistry::with_builtin();
/// linkbio_store_rest::register(&registry);
/// assert!(registry.has_document_store("rest"));
/// ```
pub fn register(registry: &linkbio_core::StoreRegistry) {
    registry.register_document_store(STORE_NAME, Box::new(RestDocumentStoreFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dry_run: bool) -> RestDocumentStore {
        RestDocumentStore::new(
            "https://db.example.com/v1/",
            "secret_token_12345",
            DEFAULT_HTTP_TIMEOUT,
            dry_run,
        )
        .unwrap()
    }

    fn rest_config(api_token: &str) -> DocumentStoreConfig {
        DocumentStoreConfig::Rest {
            base_url: "https://db.example.com/v1".to_string(),
            api_token: api_token.to_string(),
            timeout_secs: 30,
            dry_run: true,
        }
    }

    #[test]
    fn test_factory_creation() {
        let store = RestDocumentStoreFactory.create(&rest_config("token")).unwrap();
        assert_eq!(store.store_name(), "rest");
    }

    #[test]
    fn test_factory_missing_token() {
        assert!(RestDocumentStoreFactory.create(&rest_config("")).is_err());
        assert!(
            RestDocumentStoreFactory
                .create(&DocumentStoreConfig::Memory)
                .is_err()
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(RestDocumentStore::new("not a url", "token", DEFAULT_HTTP_TIMEOUT, false).is_err());
        assert!(
            RestDocumentStore::new("mailto:db@example.com", "token", DEFAULT_HTTP_TIMEOUT, false)
                .is_err()
        );
    }

    #[test]
    fn test_api_token_not_exposed_in_debug() {
        let debug_str = format!("{:?}", store(false));
        assert!(!debug_str.contains("secret_token"));
        assert!(debug_str.contains("RestDocumentStore"));
        assert!(debug_str.contains("<REDACTED>"));
    }

    #[test]
    fn test_documents_url() {
        let store = store(false);
        let url = store.documents_url("teams/abc/links").unwrap();
        assert_eq!(url.as_str(), "https://db.example.com/v1/documents/teams/abc/links");

        // Segments are percent-encoded
        let url = store.documents_url("teams/a b").unwrap();
        assert_eq!(url.as_str(), "https://db.example.com/v1/documents/teams/a%20b");
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status(StatusCode::FORBIDDEN, "", "read"),
            Error::Authentication(_)
        ));
        assert!(matches!(
            map_status(StatusCode::TOO_MANY_REQUESTS, "", "read"),
            Error::RateLimited(_)
        ));
        assert!(matches!(
            map_status(StatusCode::NOT_FOUND, "", "read"),
            Error::NotFound(_)
        ));
        match map_status(StatusCode::BAD_GATEWAY, "upstream down", "write") {
            Error::Store { store, message } => {
                assert_eq!(store, "rest");
                assert!(message.contains("transient"));
                assert!(message.contains("upstream down"));
            }
            other => panic!("expected store error, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_dry_run_writes_do_not_touch_network() {
        // Unroutable host: any real request would fail
        let store = RestDocumentStore::new(
            "http://127.0.0.1:9/v1",
            "token",
            Duration::from_millis(200),
            true,
        )
        .unwrap();
        let links = CollectionPath::new("teams/abc/links");

        let first = store.create(&links, Fields::new()).await.unwrap();
        let second = store.create(&links, Fields::new()).await.unwrap();
        assert_eq!(first, "dry-run-0");
        assert_eq!(second, "dry-run-1");

        store
            .set(&links.doc("l1"), Fields::new(), WriteMode::Replace)
            .await
            .unwrap();
        store.delete(&links.doc("l1")).await.unwrap();

        // Reads still go out
        assert!(store.query(&links, &Filter::All).await.is_err());
    }
}
