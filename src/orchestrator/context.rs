//! The set of backends a pipeline run uses.

use crate::audio::{AudioExtractor, FfmpegExtractor};
use crate::chunking::{ChunkingConfig, SentenceChunker};
use crate::config::Settings;
use crate::embedding::{create_embedder, Embedder};
use crate::error::{Result, VidscribeError};
use crate::transcription::{Transcriber, WhisperTranscriber};
use crate::vector_store::{create_vector_store, VectorStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Upper bounds for the stages that call external backends.
#[derive(Debug, Clone, Copy)]
pub struct StageTimeouts {
    pub extraction: Duration,
    pub transcription: Duration,
    pub embedding: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for StageTimeouts {
    fn from(settings: &Settings) -> Self {
        Self {
            extraction: settings.extraction_timeout(),
            transcription: settings.transcription_timeout(),
            embedding: settings.embedding_timeout(),
        }
    }
}

/// Backends and tuning shared by every job.
pub struct PipelineContext {
    pub extractor: Arc<dyn AudioExtractor>,
    pub transcriber: Arc<dyn Transcriber>,
    pub chunker: SentenceChunker,
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub timeouts: StageTimeouts,
    /// Gaps between segments up to this long are closed.
    pub silence_threshold_seconds: f64,
}

impl PipelineContext {
    /// Assemble a context from explicit backends, with default tuning.
    ///
    /// The embedder and the store must agree on the vector dimension.
    pub fn new(
        extractor: Arc<dyn AudioExtractor>,
        transcriber: Arc<dyn Transcriber>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        if embedder.dimensions() != store.dimensions() {
            return Err(VidscribeError::Config(format!(
                "embedder produces {}-dimensional vectors but the store holds {}",
                embedder.dimensions(),
                store.dimensions()
            )));
        }

        let defaults = Settings::default();
        Ok(Self {
            extractor,
            transcriber,
            chunker: SentenceChunker::default(),
            embedder,
            store,
            timeouts: StageTimeouts::default(),
            silence_threshold_seconds: defaults.transcription.silence_threshold_seconds,
        })
    }

    /// Build the production backends selected in settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let temp_dir = settings.temp_dir();
        std::fs::create_dir_all(&temp_dir)?;

        let extractor = Arc::new(FfmpegExtractor::with_format(
            temp_dir,
            settings.extraction.sample_rate,
            settings.extraction.channels,
        ));
        let transcriber = Arc::new(WhisperTranscriber::from_settings(&settings.transcription)?);
        let embedder = create_embedder(&settings.embedding)?;
        let store = create_vector_store(settings)?;

        info!(
            "Pipeline: {} via {}, {} store",
            settings.embedding.model, settings.embedding.provider, settings.vector_store.provider
        );

        Ok(Self::new(extractor, transcriber, embedder, store)?
            .with_chunker(SentenceChunker::new(ChunkingConfig::from(&settings.chunking)))
            .with_timeouts(StageTimeouts::from(settings))
            .with_silence_threshold(settings.transcription.silence_threshold_seconds))
    }

    pub fn with_chunker(mut self, chunker: SentenceChunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_silence_threshold(mut self, seconds: f64) -> Self {
        self.silence_threshold_seconds = seconds;
        self
    }

    /// Release backend resources.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{HashEmbedder, ScriptedTranscriber, StubExtractor};
    use crate::vector_store::MemoryVectorStore;

    #[test]
    fn test_dimension_mismatch_is_a_config_error() {
        let result = PipelineContext::new(
            Arc::new(StubExtractor::new()),
            Arc::new(ScriptedTranscriber::silent()),
            Arc::new(HashEmbedder::new(8)),
            Arc::new(MemoryVectorStore::new(16)),
        );
        assert!(matches!(result, Err(VidscribeError::Config(_))));
    }

    #[test]
    fn test_timeouts_follow_settings() {
        let mut settings = Settings::default();
        settings.embedding.timeout_seconds = 7;
        let timeouts = StageTimeouts::from(&settings);
        assert_eq!(timeouts.embedding, Duration::from_secs(7));
        assert_eq!(timeouts.extraction, settings.extraction_timeout());
    }
}
