//! Embedding generation for semantic search and retrieval.

mod ollama;
mod openai;

pub use ollama::OllamaEmbedder;
pub use openai::OpenAIEmbedder;

use crate::chunking::Chunk;
use crate::config::{EmbeddingProvider, EmbeddingSettings};
use crate::error::{Result, VidscribeError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

/// Trait for embedding generation.
///
/// Implementations must return the same vector for a text whether it is
/// embedded alone or as part of a batch.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}

/// Build the embedder selected in settings.
pub fn create_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match settings.provider {
        EmbeddingProvider::OpenAI => Arc::new(OpenAIEmbedder::from_settings(settings)?),
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbedder::from_settings(settings)?),
    };
    Ok(embedder)
}

/// Embed every chunk of a video, all or nothing.
///
/// Fails unless the backend returns exactly one vector per chunk, each of the
/// embedder's declared dimension.
#[instrument(skip_all, fields(chunks = chunks.len()))]
pub async fn embed_chunks(embedder: &dyn Embedder, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed_batch(&texts).await?;
    check_vectors(&vectors, texts.len(), embedder.dimensions())?;
    Ok(vectors)
}

/// Validate the shape of a backend response.
pub(crate) fn check_vectors(vectors: &[Vec<f32>], expected_count: usize, dimensions: usize) -> Result<()> {
    if vectors.len() != expected_count {
        return Err(VidscribeError::Embedding(format!(
            "backend returned {} vectors for {} inputs",
            vectors.len(),
            expected_count
        )));
    }

    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dimensions) {
        return Err(VidscribeError::Embedding(format!(
            "vector {} has dimension {}, expected {}",
            i,
            v.len(),
            dimensions
        )));
    }

    Ok(())
}
