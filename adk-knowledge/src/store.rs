//! Knowledge store façade.
//!
//! The [`KnowledgeStore`] binds one collection on a [`SearchEngine`] to an
//! [`EmbeddingProvider`]. It provisions the collection on demand, embeds
//! documents and queries, and dispatches searches to a cached
//! [`SearchExecutor`].
//!
//! # Example
//!
//! ```rust,ignore
//! use adk_knowledge::{CollectionDescriptor, InMemoryEngine, KnowledgeStore, Document};
//!
//! let store = KnowledgeStore::builder()
//!     .descriptor(CollectionDescriptor::new("docs", 3))
//!     .engine(Arc::new(InMemoryEngine::new()))
//!     .embedding_provider(Arc::new(my_embedder))
//!     .build()?;
//!
//! let report = store.insert(vec![Document::new("a", "apple")]).await?;
//! let results = store.search("apple", 5, None).await;
//! ```

use std::sync::Arc;

use futures::StreamExt;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::KnowledgeConfig;
use crate::document::{Document, IngestOutcome, IngestReport, SearchMode};
use crate::embedding::EmbeddingProvider;
use crate::engine::{CollectionInfo, SearchEngine};
use crate::error::{KnowledgeError, Result};
use crate::filter::Filters;
use crate::lifecycle::CollectionManager;
use crate::schema::{
    CONTENT_FIELD, CollectionDescriptor, EMBEDDING_FIELD, ID_FIELD, METADATA_FIELD,
};
use crate::search::{SearchExecutor, SearchRequest, SearchStats};

/// Ingestion, search and lifecycle operations for one collection.
///
/// Construct one via [`KnowledgeStore::builder()`].
pub struct KnowledgeStore {
    descriptor: CollectionDescriptor,
    config: KnowledgeConfig,
    engine: Arc<dyn SearchEngine>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    collections: CollectionManager,
    executor: RwLock<Option<Arc<SearchExecutor>>>,
}

impl KnowledgeStore {
    /// Create a new [`KnowledgeStoreBuilder`].
    pub fn builder() -> KnowledgeStoreBuilder {
        KnowledgeStoreBuilder::default()
    }

    /// The collection this store manages.
    pub fn descriptor(&self) -> &CollectionDescriptor {
        &self.descriptor
    }

    /// The store configuration.
    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    /// The collection name.
    pub fn collection(&self) -> &str {
        &self.descriptor.name
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Create the collection if it does not already exist.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::ProvisioningError`] if the engine rejects
    /// the schema.
    pub async fn create(&self) -> Result<()> {
        self.collections.create(&self.descriptor).await
    }

    /// Whether the collection exists. Probe failures count as absent.
    pub async fn exists(&self) -> bool {
        self.collections.exists(self.collection()).await
    }

    /// Whether a collection called `name` exists on the same engine.
    pub async fn name_exists(&self, name: &str) -> bool {
        self.collections.exists(name).await
    }

    /// Drop the collection and forget the cached search handle.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::ProvisioningError`] if the engine fails for
    /// any reason other than the collection being absent.
    pub async fn drop(&self) -> Result<()> {
        let result = self.collections.drop(self.collection()).await;
        self.executor.write().await.take();
        result
    }

    /// Drop the collection, reporting success as a boolean.
    pub async fn delete(&self) -> bool {
        self.drop().await.is_ok()
    }

    /// Whether a document with `id` is stored in the collection.
    pub async fn doc_exists(&self, id: &str) -> bool {
        match self.engine.retrieve_document(self.collection(), id).await {
            Ok(_) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                error!(
                    collection = %self.collection(),
                    document.id = id,
                    error = %e,
                    "failed to probe document"
                );
                false
            }
        }
    }

    /// Number of documents in the collection.
    pub async fn document_count(&self) -> Result<u64> {
        self.collections.document_count(self.collection()).await
    }

    /// Every collection on the engine.
    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        self.collections.list().await
    }

    /// Search outcome counters of the current search handle.
    ///
    /// Counters start again from zero after [`drop`](Self::drop).
    pub async fn search_stats(&self) -> SearchStats {
        self.executor.read().await.as_ref().map(|e| e.stats()).unwrap_or_default()
    }

    // ── Ingestion ──────────────────────────────────────────────────

    /// Store `documents`, embedding any that arrive without a vector.
    ///
    /// The collection is created first when missing. Each document is then
    /// stored independently: a failure is recorded in the returned
    /// [`IngestReport`] and does not stop the batch.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::ProvisioningError`] if the collection
    /// cannot be created. Per-document failures are not errors.
    pub async fn insert(&self, documents: Vec<Document>) -> Result<IngestReport> {
        self.create().await?;

        let total = documents.len();
        let outcomes: Vec<IngestOutcome> = futures::stream::iter(documents)
            .map(|document| self.ingest_one(document))
            .buffered(self.config.ingest_concurrency)
            .collect()
            .await;
        let report = IngestReport { outcomes };

        let failed = report.failed().count();
        if failed > 0 {
            warn!(collection = %self.collection(), total, failed, "ingested batch with failures");
        } else {
            info!(collection = %self.collection(), total, "ingested batch");
        }
        Ok(report)
    }

    /// Create or replace `documents`. Shares the [`insert`](Self::insert) path,
    /// which is already keyed by id.
    pub async fn upsert(&self, documents: Vec<Document>) -> Result<IngestReport> {
        self.insert(documents).await
    }

    async fn ingest_one(&self, mut document: Document) -> IngestOutcome {
        if document.id.is_empty() {
            document.id = Uuid::new_v4().to_string();
        }
        let id = document.id.clone();
        match self.store_document(document).await {
            Ok(()) => {
                debug!(collection = %self.collection(), document.id = %id, "stored document");
                IngestOutcome::stored(id)
            }
            Err(e) => {
                error!(
                    collection = %self.collection(),
                    document.id = %id,
                    error = %e,
                    "failed to store document"
                );
                IngestOutcome::failed(id, e.to_string())
            }
        }
    }

    async fn store_document(&self, mut document: Document) -> Result<()> {
        if document.embedding.is_none() && !document.content.is_empty() {
            document.embedding = Some(self.embedding_provider.embed(&document.content).await?);
        }
        if let Some(embedding) = &document.embedding {
            if embedding.len() != self.descriptor.dimensions {
                return Err(KnowledgeError::DimensionMismatch {
                    expected: self.descriptor.dimensions,
                    actual: embedding.len(),
                });
            }
        }
        self.engine.upsert_document(self.collection(), &to_record(document)).await
    }

    // ── Search ─────────────────────────────────────────────────────

    /// Search with the configured [`SearchMode`].
    ///
    /// Any failure yields an empty result; see [`search_stats`](Self::search_stats)
    /// to tell failures from misses.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: Option<&Filters>,
    ) -> Vec<Document> {
        self.search_with_mode(query, self.config.search_mode, limit, filters).await
    }

    /// Search with an explicit strategy.
    pub async fn search_with_mode(
        &self,
        query: &str,
        mode: SearchMode,
        limit: usize,
        filters: Option<&Filters>,
    ) -> Vec<Document> {
        if limit == 0 {
            warn!(
                collection = %self.collection(),
                strategy = %mode,
                "search limit must be greater than zero"
            );
            return Vec::new();
        }
        if mode != SearchMode::Vector && query.trim().is_empty() {
            warn!(
                collection = %self.collection(),
                strategy = %mode,
                "empty query for a lexical search"
            );
            return Vec::new();
        }
        let Some(executor) = self.executor_or_log(mode).await else {
            return Vec::new();
        };

        match mode {
            SearchMode::Keyword => executor.keyword_search(query, limit, filters).await,
            SearchMode::Vector | SearchMode::Hybrid => {
                let vector = match self.embedding_provider.embed(query).await {
                    Ok(vector) => vector,
                    Err(e) => {
                        error!(
                            collection = %self.collection(),
                            strategy = %mode,
                            embedder = self.embedding_provider.name(),
                            error = %e,
                            "query embedding failed"
                        );
                        return Vec::new();
                    }
                };
                let request = match mode {
                    SearchMode::Hybrid => SearchRequest::Hybrid(query, &vector),
                    _ => SearchRequest::Vector(&vector),
                };
                executor.search(request, limit, filters).await
            }
        }
    }

    /// Nearest neighbours of a precomputed vector.
    pub async fn search_by_vector(
        &self,
        vector: &[f32],
        limit: usize,
        filters: Option<&Filters>,
    ) -> Vec<Document> {
        if limit == 0 {
            warn!(collection = %self.collection(), "search limit must be greater than zero");
            return Vec::new();
        }
        match self.executor_or_log(SearchMode::Vector).await {
            Some(executor) => executor.vector_search(vector, limit, filters).await,
            None => Vec::new(),
        }
    }

    async fn executor_or_log(&self, mode: SearchMode) -> Option<Arc<SearchExecutor>> {
        match self.executor().await {
            Ok(executor) => Some(executor),
            Err(e) => {
                error!(
                    collection = %self.collection(),
                    strategy = %mode,
                    error = %e,
                    "search handle unavailable"
                );
                None
            }
        }
    }

    /// The cached search handle, provisioning the collection on first use.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::ProvisioningError`] if the collection
    /// cannot be created.
    pub async fn executor(&self) -> Result<Arc<SearchExecutor>> {
        if let Some(executor) = self.executor.read().await.as_ref() {
            return Ok(Arc::clone(executor));
        }

        self.create().await?;

        let mut slot = self.executor.write().await;
        // Another caller may have filled the slot while we provisioned.
        let executor = slot.get_or_insert_with(|| {
            Arc::new(SearchExecutor::new(
                Arc::clone(&self.engine),
                self.descriptor.name.clone(),
                self.descriptor.hnsw.map(|h| h.ef),
            ))
        });
        Ok(Arc::clone(executor))
    }
}

/// The engine record for a document.
fn to_record(document: Document) -> Value {
    let mut record = Map::new();
    record.insert(ID_FIELD.to_string(), Value::String(document.id));
    record.insert(CONTENT_FIELD.to_string(), Value::String(document.content));
    let metadata = Value::Object(document.metadata.into_iter().collect());
    record.insert(METADATA_FIELD.to_string(), metadata);
    let embedding = match document.embedding {
        Some(embedding) => Value::from(embedding),
        None => Value::Null,
    };
    record.insert(EMBEDDING_FIELD.to_string(), embedding);
    Value::Object(record)
}

/// Builder for constructing a [`KnowledgeStore`].
///
/// `descriptor`, `engine` and `embedding_provider` are required; `config`
/// defaults to [`KnowledgeConfig::default()`].
#[derive(Default)]
pub struct KnowledgeStoreBuilder {
    descriptor: Option<CollectionDescriptor>,
    config: Option<KnowledgeConfig>,
    engine: Option<Arc<dyn SearchEngine>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
}

impl KnowledgeStoreBuilder {
    /// Set the collection descriptor.
    pub fn descriptor(mut self, descriptor: CollectionDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    /// Set the store configuration.
    pub fn config(mut self, config: KnowledgeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the search engine.
    pub fn engine(mut self, engine: Arc<dyn SearchEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Build the [`KnowledgeStore`].
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::ConfigError`] if a required field is
    /// missing, the descriptor or config is invalid, or the provider's
    /// dimensionality differs from the descriptor's.
    pub fn build(self) -> Result<KnowledgeStore> {
        let descriptor = self
            .descriptor
            .ok_or_else(|| KnowledgeError::ConfigError("descriptor is required".to_string()))?;
        let engine = self
            .engine
            .ok_or_else(|| KnowledgeError::ConfigError("engine is required".to_string()))?;
        let embedding_provider = self.embedding_provider.ok_or_else(|| {
            KnowledgeError::ConfigError("embedding_provider is required".to_string())
        })?;
        descriptor.validate()?;
        if embedding_provider.dimensions() != descriptor.dimensions {
            return Err(KnowledgeError::ConfigError(format!(
                "embedding provider produces {} dimensions but collection '{}' declares {}",
                embedding_provider.dimensions(),
                descriptor.name,
                descriptor.dimensions
            )));
        }

        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(KnowledgeStore {
            collections: CollectionManager::new(Arc::clone(&engine)),
            descriptor,
            config,
            engine,
            embedding_provider,
            executor: RwLock::new(None),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn record_nests_metadata_and_nulls_missing_embedding() {
        let record = to_record(Document::new("a", "").with_metadata("topic", "rust"));
        assert_eq!(
            record,
            json!({"id": "a", "content": "", "metadata": {"topic": "rust"}, "embedding": null})
        );
    }
}
