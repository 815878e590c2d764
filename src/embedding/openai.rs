//! OpenAI embeddings implementation.

use super::{check_vectors, Embedder};
use crate::config::EmbeddingSettings;
use crate::error::{Result, Stage, VidscribeError};
use crate::openai::create_client;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// OpenAI-based embedder.
pub struct OpenAIEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder with default settings.
    pub fn new() -> Result<Self> {
        Self::from_settings(&EmbeddingSettings::default())
    }

    /// Create an OpenAI embedder from embedding settings.
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: settings.model.clone(),
            dimensions: settings.dimensions as usize,
            batch_size: settings.batch_size.max(1),
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| VidscribeError::Embedding("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let request = CreateEmbeddingRequestArgs::default()
                .model(&self.model)
                .input(EmbeddingInput::StringArray(batch.to_vec()))
                .dimensions(self.dimensions as u32)
                .build()
                .map_err(|e| VidscribeError::Embedding(format!("Failed to build request: {}", e)))?;

            let response = self.client.embeddings().create(request).await.map_err(|e| {
                VidscribeError::OpenAI {
                    stage: Stage::Embedding,
                    message: format!("Embedding API error: {}", e),
                }
            })?;

            // Sort by index to ensure correct order
            let mut data = response.data;
            data.sort_by_key(|e| e.index);

            let vectors: Vec<Vec<f32>> = data.into_iter().map(|d| d.embedding).collect();
            check_vectors(&vectors, batch.len(), self.dimensions)?;
            all_embeddings.extend(vectors);
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
