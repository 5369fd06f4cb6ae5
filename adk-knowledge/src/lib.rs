//! Knowledge store adapter for ADK-Rust agents.
//!
//! This crate provides:
//! - Collection schemas with vector fields and index tuning
//! - Idempotent collection provisioning
//! - Ingestion with on-demand embedding and a per-document outcome ledger
//! - Vector, keyword and hybrid search normalized into [`Document`]s
//! - A Typesense HTTP backend and an in-memory backend behind [`SearchEngine`]
//! - Text file loading, chunking and an agent-facing search tool
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use adk_knowledge::{
//!     CollectionDescriptor, Document, KnowledgeStore, TypesenseConfig, TypesenseEngine,
//! };
//!
//! let engine = TypesenseEngine::new(TypesenseConfig::from_env()?)?;
//! let store = KnowledgeStore::builder()
//!     .descriptor(CollectionDescriptor::new("docs", 512))
//!     .engine(Arc::new(engine))
//!     .embedding_provider(Arc::new(my_embedder))
//!     .build()?;
//!
//! store.insert(vec![Document::new("a", "apple pie recipe")]).await?;
//! let hits = store.search("apple", 5, None).await;
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod filter;
pub mod inmemory;
pub mod knowledge;
pub mod lifecycle;
pub mod normalize;
#[cfg(feature = "openai")]
pub mod openai;
pub mod reader;
pub mod schema;
pub mod search;
pub mod store;
pub mod tool;
pub mod typesense;

pub use chunking::{Chunker, FixedSizeChunker, MarkdownChunker, RecursiveChunker};
pub use config::{KnowledgeConfig, KnowledgeConfigBuilder, TypesenseConfig, TypesenseConfigBuilder};
pub use document::{Document, IngestOutcome, IngestReport, IngestStatus, SearchMode};
pub use embedding::EmbeddingProvider;
pub use engine::{CollectionInfo, SearchEngine, SearchQuery, SearchResponse, VectorQuery};
pub use error::{KnowledgeError, Result};
pub use filter::{FilterExpression, Filters, Predicate, compile_filters};
pub use inmemory::InMemoryEngine;
pub use knowledge::{KnowledgeBase, LoadPolicy, LoadSummary};
pub use lifecycle::CollectionManager;
pub use normalize::normalize;
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
pub use reader::TextReader;
pub use schema::{
    CollectionDescriptor, CollectionSchema, DistanceMetric, Field, FieldType, HnswConfig,
    build_schema,
};
pub use search::{SearchExecutor, SearchOutcome, SearchRequest, SearchStats};
pub use store::{KnowledgeStore, KnowledgeStoreBuilder};
pub use tool::KnowledgeSearchTool;
pub use typesense::TypesenseEngine;
