//! Ollama embeddings implementation.

use super::{check_vectors, Embedder};
use crate::config::EmbeddingSettings;
use crate::error::{Result, VidscribeError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Embedder backed by a local Ollama server.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    /// Default Ollama API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:11434";

    /// Create an Ollama embedder from embedding settings.
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| VidscribeError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: Self::endpoint(&settings.ollama_url)?,
            model: settings.model.clone(),
            dimensions: settings.dimensions as usize,
            batch_size: settings.batch_size.max(1),
        })
    }

    /// `{base}/api/embed`, tolerating a trailing slash on the base.
    fn endpoint(base_url: &str) -> Result<Url> {
        let mut base = Url::parse(base_url)
            .map_err(|e| VidscribeError::Config(format!("Invalid Ollama URL '{}': {}", base_url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join("api/embed")
            .map_err(|e| VidscribeError::Config(format!("Invalid Ollama URL '{}': {}", base_url, e)))
    }

    async fn request(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&EmbedRequest {
                model: &self.model,
                input: batch,
            })
            .send()
            .await
            .map_err(|e| VidscribeError::Embedding(format!("Ollama unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VidscribeError::Embedding(format!(
                "Ollama embedding error {}: {}",
                status,
                body.trim()
            )));
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            VidscribeError::Embedding(format!("Malformed Ollama embedding response: {}", e))
        })?;
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| VidscribeError::Embedding("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let vectors = self.request(batch).await?;
            check_vectors(&vectors, batch.len(), self.dimensions)?;
            all_embeddings.extend(vectors);
        }

        debug!("Generated {} embeddings via Ollama", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_api_path() {
        assert_eq!(
            OllamaEmbedder::endpoint("http://localhost:11434").unwrap().as_str(),
            "http://localhost:11434/api/embed"
        );
        assert_eq!(
            OllamaEmbedder::endpoint("http://gpu-box:11434/ollama/").unwrap().as_str(),
            "http://gpu-box:11434/ollama/api/embed"
        );
        assert!(OllamaEmbedder::endpoint("::nope").is_err());
    }

    #[test]
    fn test_request_shape() {
        let input = vec!["a".to_string(), "b".to_string()];
        let body = serde_json::to_value(EmbedRequest {
            model: "nomic-embed-text",
            input: &input,
        })
        .unwrap();
        assert_eq!(body["model"], "nomic-embed-text");
        assert_eq!(body["input"][1], "b");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_embedding_error() {
        let settings = EmbeddingSettings {
            ollama_url: "http://127.0.0.1:9".to_string(),
            dimensions: 4,
            timeout_seconds: 2,
            ..Default::default()
        };
        let embedder = OllamaEmbedder::from_settings(&settings).unwrap();
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, VidscribeError::Embedding(_)));
    }
}
