//! Search execution against one collection.
//!
//! A [`SearchExecutor`] is the search-session handle a
//! [`KnowledgeStore`](crate::KnowledgeStore) caches per collection. Each
//! strategy sends exactly one multi-search request carrying one query
//! descriptor, then runs the hits through [`normalize`].
//!
//! The strategy methods never fail: transport errors, malformed responses
//! and per-query engine errors all become an empty result and a log line.
//! The two kinds of empty result are still told apart in [`SearchStats`]
//! and in the `outcome` field of the emitted tracing event.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error};

use crate::document::{Document, SearchMode};
use crate::engine::{SearchEngine, SearchQuery, VectorQuery};
use crate::error::{KnowledgeError, Result};
use crate::filter::{Filters, compile_filters};
use crate::normalize::normalize;
use crate::schema::{CONTENT_FIELD, EMBEDDING_FIELD};

/// Longest query prefix included in log lines.
const QUERY_PREVIEW_CHARS: usize = 100;

/// What a single search call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The engine returned this many documents.
    Hits(usize),
    /// The engine answered, but nothing matched.
    Empty,
    /// The search did not complete.
    Failed,
}

impl fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hits(n) => write!(f, "hits({n})"),
            Self::Empty => f.write_str("empty"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Counters of search outcomes, as returned by [`SearchExecutor::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Searches that returned at least one document.
    pub hits: u64,
    /// Searches that completed with zero documents.
    pub empty: u64,
    /// Searches that failed and were reported as empty.
    pub failed: u64,
}

impl SearchStats {
    /// Total number of searches recorded.
    pub fn total(&self) -> u64 {
        self.hits + self.empty + self.failed
    }
}

#[derive(Debug, Default)]
struct StatCounters {
    hits: AtomicU64,
    empty: AtomicU64,
    failed: AtomicU64,
}

impl StatCounters {
    fn record(&self, outcome: SearchOutcome) {
        let counter = match outcome {
            SearchOutcome::Hits(_) => &self.hits,
            SearchOutcome::Empty => &self.empty,
            SearchOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SearchStats {
        SearchStats {
            hits: self.hits.load(Ordering::Relaxed),
            empty: self.empty.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// The inputs of one search, by strategy.
#[derive(Debug, Clone, Copy)]
pub enum SearchRequest<'a> {
    /// Nearest neighbours of a vector.
    Vector(&'a [f32]),
    /// Lexical match of a text against the content field.
    Keyword(&'a str),
    /// Lexical text and query vector together.
    Hybrid(&'a str, &'a [f32]),
}

impl SearchRequest<'_> {
    /// The strategy this request runs.
    pub fn mode(&self) -> SearchMode {
        match self {
            Self::Vector(_) => SearchMode::Vector,
            Self::Keyword(_) => SearchMode::Keyword,
            Self::Hybrid(..) => SearchMode::Hybrid,
        }
    }

    fn preview(&self) -> String {
        match self {
            Self::Keyword(text) | Self::Hybrid(text, _) => {
                text.chars().take(QUERY_PREVIEW_CHARS).collect()
            }
            Self::Vector(vector) => format!("<vector dim={}>", vector.len()),
        }
    }
}

/// Search-session handle bound to one collection.
pub struct SearchExecutor {
    engine: Arc<dyn SearchEngine>,
    collection: String,
    ef: Option<usize>,
    stats: StatCounters,
}

impl SearchExecutor {
    /// Create a handle for `collection`.
    ///
    /// `ef` is the search-time candidate list size carried into every
    /// vector clause; `None` leaves it to the engine.
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        collection: impl Into<String>,
        ef: Option<usize>,
    ) -> Self {
        Self { engine, collection: collection.into(), ef, stats: StatCounters::default() }
    }

    /// The collection this handle searches.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Counters of the outcomes recorded so far.
    pub fn stats(&self) -> SearchStats {
        self.stats.snapshot()
    }

    /// Documents nearest to `vector`, closest first.
    pub async fn vector_search(
        &self,
        vector: &[f32],
        limit: usize,
        filters: Option<&Filters>,
    ) -> Vec<Document> {
        self.search(SearchRequest::Vector(vector), limit, filters).await
    }

    /// Documents whose content matches `text`, best lexical match first.
    pub async fn keyword_search(
        &self,
        text: &str,
        limit: usize,
        filters: Option<&Filters>,
    ) -> Vec<Document> {
        self.search(SearchRequest::Keyword(text), limit, filters).await
    }

    /// Documents ranked by the engine's fusion of lexical and vector rank.
    pub async fn hybrid_search(
        &self,
        text: &str,
        vector: &[f32],
        limit: usize,
        filters: Option<&Filters>,
    ) -> Vec<Document> {
        self.search(SearchRequest::Hybrid(text, vector), limit, filters).await
    }

    /// Run `request`, recording its outcome and reporting failures as empty.
    pub async fn search(
        &self,
        request: SearchRequest<'_>,
        limit: usize,
        filters: Option<&Filters>,
    ) -> Vec<Document> {
        match self.try_search(request, limit, filters).await {
            Ok(documents) => {
                let outcome = if documents.is_empty() {
                    SearchOutcome::Empty
                } else {
                    SearchOutcome::Hits(documents.len())
                };
                self.stats.record(outcome);
                debug!(
                    collection = %self.collection,
                    strategy = %request.mode(),
                    limit,
                    query = %request.preview(),
                    outcome = %outcome,
                    "search completed"
                );
                documents
            }
            Err(e) => {
                let outcome = SearchOutcome::Failed;
                self.stats.record(outcome);
                error!(
                    collection = %self.collection,
                    strategy = %request.mode(),
                    limit,
                    query = %request.preview(),
                    outcome = %outcome,
                    error = %e,
                    "search failed"
                );
                Vec::new()
            }
        }
    }

    /// Run `request` and surface failures instead of swallowing them.
    ///
    /// Outcomes are not recorded in [`SearchStats`].
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::ConfigError`] for a zero limit, the engine's
    /// error when the request fails, and [`KnowledgeError::EngineError`]
    /// when the engine reports a per-query error.
    pub async fn try_search(
        &self,
        request: SearchRequest<'_>,
        limit: usize,
        filters: Option<&Filters>,
    ) -> Result<Vec<Document>> {
        if limit == 0 {
            return Err(KnowledgeError::ConfigError("limit must be greater than zero".into()));
        }
        let query = self.build_query(request, limit, filters);
        if query.filter_by.as_ref().is_some_and(|f| f.matches_nothing()) {
            debug!(collection = %self.collection, "filter has an empty list, skipping engine");
            return Ok(Vec::new());
        }

        let response = self
            .engine
            .multi_search(std::slice::from_ref(&query))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                KnowledgeError::MalformedResponse("multi_search returned no results".into())
            })?;

        if let Some(message) = response.error {
            return Err(KnowledgeError::EngineError {
                backend: self.engine.backend().to_string(),
                status: response.code,
                message,
            });
        }
        Ok(normalize(response.hits))
    }

    fn build_query(
        &self,
        request: SearchRequest<'_>,
        limit: usize,
        filters: Option<&Filters>,
    ) -> SearchQuery {
        let vector_clause = |vector: &[f32], k: Option<usize>| VectorQuery {
            field: EMBEDDING_FIELD.to_string(),
            vector: vector.to_vec(),
            k,
            ef: self.ef,
        };
        let (q, query_by, vector_query) = match request {
            SearchRequest::Vector(vector) => {
                (SearchQuery::WILDCARD.to_string(), None, Some(vector_clause(vector, Some(limit))))
            }
            SearchRequest::Keyword(text) => {
                (text.to_string(), Some(CONTENT_FIELD.to_string()), None)
            }
            SearchRequest::Hybrid(text, vector) => (
                text.to_string(),
                Some(CONTENT_FIELD.to_string()),
                Some(vector_clause(vector, None)),
            ),
        };
        SearchQuery {
            collection: self.collection.clone(),
            q,
            query_by,
            vector_query,
            filter_by: compile_filters(filters),
            limit,
        }
    }
}

impl fmt::Debug for SearchExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchExecutor")
            .field("backend", &self.engine.backend())
            .field("collection", &self.collection)
            .field("ef", &self.ef)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
