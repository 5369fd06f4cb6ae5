//! Typesense engine backend.
//!
//! Provides [`TypesenseEngine`] which implements [`SearchEngine`] over the
//! Typesense REST API using [reqwest](https://docs.rs/reqwest). Failed
//! requests are retried a bounded number of times with a constant delay when
//! the failure is a transport error or a `5xx` response.
//!
//! # Example
//!
//! ```rust,ignore
//! use adk_knowledge::{TypesenseConfig, typesense::TypesenseEngine};
//!
//! let engine = TypesenseEngine::new(TypesenseConfig::from_env()?)?;
//! let collections = engine.list_collections().await?;
//! ```

use async_trait::async_trait;
use backon::{ConstantBuilder, Retryable};
use reqwest::{Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::TypesenseConfig;
use crate::engine::{CollectionInfo, SearchEngine, SearchQuery, SearchResponse};
use crate::error::{KnowledgeError, Result};
use crate::schema::CollectionSchema;

const BACKEND: &str = "typesense";
const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";

/// A [`SearchEngine`] backed by a [Typesense](https://typesense.org/) node.
pub struct TypesenseEngine {
    client: reqwest::Client,
    config: TypesenseConfig,
    base_url: String,
}

impl TypesenseEngine {
    /// Create an engine for the node described by `config`.
    pub fn new(config: TypesenseConfig) -> Result<Self> {
        let base_url = config.base_url();
        Self::with_base_url(config, base_url)
    }

    /// Create an engine from the `TYPESENSE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(TypesenseConfig::from_env()?)
    }

    /// Create an engine that talks to `base_url` instead of the configured node.
    ///
    /// Timeouts, retries and the API key still come from `config`.
    pub fn with_base_url(config: TypesenseConfig, base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.connection_timeout)
            .build()
            .map_err(|e| KnowledgeError::ConfigError(format!("failed to build http client: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| {
            KnowledgeError::ConfigError(format!("invalid base url '{base_url}': {e}"))
        })?;
        Ok(Self { client, config, base_url })
    }

    /// The connection settings in use.
    pub fn config(&self) -> &TypesenseConfig {
        &self.config
    }

    fn map_err(e: reqwest::Error) -> KnowledgeError {
        KnowledgeError::EngineError {
            backend: BACKEND.to_string(),
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }

    /// Build a URL from percent-encoded path segments.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            KnowledgeError::ConfigError(format!("invalid base url '{}': {e}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                KnowledgeError::ConfigError(format!(
                    "base url '{}' cannot hold a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request, retrying transport failures and `5xx` responses.
    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = self.url(segments)?;
        let resource = segments.join("/");
        let backoff = ConstantBuilder::default()
            .with_delay(self.config.retry_interval)
            .with_max_times(self.config.num_retries);

        (|| self.send_once(method.clone(), url.clone(), &resource, query, body))
            .retry(backoff)
            .when(KnowledgeError::is_retryable)
            .notify(|e, delay| {
                warn!(
                    backend = BACKEND,
                    resource = %resource,
                    error = %e,
                    ?delay,
                    "retrying request"
                );
            })
            .await
    }

    async fn send_once(
        &self,
        method: Method,
        url: Url,
        resource: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let mut request = self
            .client
            .request(method.clone(), url)
            .header(API_KEY_HEADER, &self.config.api_key);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(Self::map_err)?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(KnowledgeError::NotFound {
                backend: BACKEND.to_string(),
                resource: resource.to_string(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail =
                serde_json::from_str::<ErrorResponse>(&body).map(|e| e.message).unwrap_or(body);
            return Err(KnowledgeError::EngineError {
                backend: BACKEND.to_string(),
                status: Some(status.as_u16()),
                message: format!("{method} /{resource} returned {status}: {detail}"),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            KnowledgeError::MalformedResponse(format!("{method} /{resource}: {e}"))
        })
    }

    fn decode<T: for<'de> Deserialize<'de>>(value: Value, what: &str) -> Result<T> {
        serde_json::from_value(value)
            .map_err(|e| KnowledgeError::MalformedResponse(format!("{what}: {e}")))
    }
}

// ── Typesense wire types ───────────────────────────────────────────

#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Serialize)]
struct MultiSearchRequest<'a> {
    searches: Vec<WireSearch<'a>>,
}

#[derive(Serialize)]
struct WireSearch<'a> {
    collection: &'a str,
    q: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_by: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vector_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter_by: Option<String>,
    limit: usize,
}

impl<'a> From<&'a SearchQuery> for WireSearch<'a> {
    fn from(query: &'a SearchQuery) -> Self {
        Self {
            collection: &query.collection,
            q: &query.q,
            query_by: query.query_by.as_deref(),
            vector_query: query.vector_query.as_ref().map(ToString::to_string),
            filter_by: query.filter_by.as_ref().map(ToString::to_string),
            limit: query.limit,
        }
    }
}

#[derive(Deserialize)]
struct MultiSearchResponse {
    results: Vec<SearchResponse>,
}

// ── SearchEngine implementation ────────────────────────────────────

#[async_trait]
impl SearchEngine for TypesenseEngine {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<CollectionInfo> {
        let body = serde_json::to_value(schema)
            .map_err(|e| KnowledgeError::ConfigError(format!("unserializable schema: {e}")))?;
        let value = self.send(Method::POST, &["collections"], &[], Some(&body)).await?;
        debug!(collection = %schema.name, "created typesense collection");
        Self::decode(value, "collection")
    }

    async fn retrieve_collection(&self, name: &str) -> Result<CollectionInfo> {
        let value = self.send(Method::GET, &["collections", name], &[], None).await?;
        Self::decode(value, "collection")
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.send(Method::DELETE, &["collections", name], &[], None).await?;
        debug!(collection = name, "deleted typesense collection");
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let value = self.send(Method::GET, &["collections"], &[], None).await?;
        Self::decode(value, "collection list")
    }

    async fn upsert_document(&self, collection: &str, document: &Value) -> Result<()> {
        self.send(
            Method::POST,
            &["collections", collection, "documents"],
            &[("action", "upsert")],
            Some(document),
        )
        .await?;
        Ok(())
    }

    async fn retrieve_document(&self, collection: &str, id: &str) -> Result<Value> {
        self.send(Method::GET, &["collections", collection, "documents", id], &[], None).await
    }

    async fn multi_search(&self, searches: &[SearchQuery]) -> Result<Vec<SearchResponse>> {
        let request =
            MultiSearchRequest { searches: searches.iter().map(WireSearch::from).collect() };
        let body = serde_json::to_value(&request)
            .map_err(|e| KnowledgeError::ConfigError(format!("unserializable search: {e}")))?;

        let value = self.send(Method::POST, &["multi_search"], &[], Some(&body)).await?;
        let response: MultiSearchResponse = Self::decode(value, "multi_search response")?;

        if response.results.len() != searches.len() {
            return Err(KnowledgeError::MalformedResponse(format!(
                "multi_search returned {} results for {} searches",
                response.results.len(),
                searches.len()
            )));
        }
        Ok(response.results)
    }
}
