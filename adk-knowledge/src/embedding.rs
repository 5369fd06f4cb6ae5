//! The embedding capability: text in, fixed-length vector out.

use async_trait::async_trait;

use crate::error::Result;

/// Turns text into a vector of [`dimensions`](EmbeddingProvider::dimensions) floats.
///
/// The knowledge store calls [`embed`](EmbeddingProvider::embed) once per
/// document that arrives without an embedding, and once per vector or hybrid
/// query. A failure only affects the document (or query) being embedded.
///
/// # Example
///
/// ```rust,ignore
/// use adk_knowledge::EmbeddingProvider;
///
/// let vector = provider.embed("hello world").await?;
/// assert_eq!(vector.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;

    /// Name used in logs.
    fn name(&self) -> &str {
        "embedder"
    }
}
