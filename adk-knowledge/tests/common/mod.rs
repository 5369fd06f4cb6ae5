//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use adk_knowledge::{
    CollectionDescriptor, EmbeddingProvider, InMemoryEngine, KnowledgeConfig, KnowledgeError,
    KnowledgeStore,
};

/// Text containing this marker fails to embed.
pub const FAIL_MARKER: &str = "FAIL";

/// Deterministic hash-based embeddings that fail on [`FAIL_MARKER`].
pub struct MockEmbeddingProvider {
    dimensions: usize,
    calls: AtomicUsize,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> adk_knowledge::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.contains(FAIL_MARKER) {
            return Err(KnowledgeError::EmbeddingError {
                provider: "mock".into(),
                message: format!("refusing to embed '{text}'"),
            });
        }
        let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut embedding = vec![0.0f32; self.dimensions];
        for (i, v) in embedding.iter_mut().enumerate() {
            *v = ((hash.wrapping_add(i as u64)) as f32).sin();
        }
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            embedding.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

pub struct Fixture {
    pub engine: Arc<InMemoryEngine>,
    pub embedder: Arc<MockEmbeddingProvider>,
    pub store: KnowledgeStore,
}

/// A store over a fresh in-memory engine with a 3-dimensional cosine collection.
pub fn fixture(config: KnowledgeConfig) -> Fixture {
    let engine = Arc::new(InMemoryEngine::new());
    let embedder = Arc::new(MockEmbeddingProvider::new(3));
    let store = KnowledgeStore::builder()
        .descriptor(CollectionDescriptor::new("docs", 3))
        .engine(engine.clone())
        .embedding_provider(embedder.clone())
        .config(config)
        .build()
        .unwrap();
    Fixture { engine, embedder, store }
}
