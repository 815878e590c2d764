//! Vector store abstraction for vidscribe.
//!
//! Provides a trait-based interface for different vector database backends.
//! Every backend replaces a video's record and chunks as one unit: readers
//! see the old set or the new set, never a mix.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::chunking::Chunk;
use crate::config::{Settings, VectorStoreProvider};
use crate::error::{Result, VidscribeError};
use crate::transcription::{format_timestamp, Transcript, TranscriptSegment};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Arc;

/// A chunk persisted with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    pub chunk_id: String,
    pub video_id: String,
    pub index: usize,
    pub text: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    #[serde(skip_serializing, default)]
    pub embedding: Vec<f32>,
    pub indexed_at: DateTime<Utc>,
}

impl StoredChunk {
    /// Pair a chunk with its embedding.
    pub fn new(chunk: &Chunk, embedding: Vec<f32>, indexed_at: DateTime<Utc>) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            video_id: chunk.video_id.clone(),
            index: chunk.index,
            text: chunk.text.clone(),
            start_seconds: chunk.start_seconds,
            end_seconds: chunk.end_seconds,
            embedding,
            indexed_at,
        }
    }

    /// Format the start time for display.
    pub fn format_timestamp(&self) -> String {
        format_timestamp(self.start_seconds)
    }
}

/// A search hit.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub chunk_id: String,
    pub video_id: String,
    pub text: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    /// Cosine similarity (higher is better).
    pub score: f32,
}

impl QueryResult {
    fn scored(chunk: &StoredChunk, score: f32) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            video_id: chunk.video_id.clone(),
            text: chunk.text.clone(),
            start_seconds: chunk.start_seconds,
            end_seconds: chunk.end_seconds,
            score,
        }
    }

    /// Format the start time for display.
    pub fn format_timestamp(&self) -> String {
        format_timestamp(self.start_seconds)
    }
}

/// Optional restrictions on a query.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    /// Only return chunks of this video.
    pub video_id: Option<String>,
    /// Drop hits scoring below this.
    pub min_score: Option<f32>,
}

impl QueryFilter {
    pub fn video(video_id: impl Into<String>) -> Self {
        Self {
            video_id: Some(video_id.into()),
            min_score: None,
        }
    }

    fn matches_video(&self, video_id: &str) -> bool {
        self.video_id.as_deref().is_none_or(|v| v == video_id)
    }
}

/// Where an indexed video came from and how it was transcribed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// File the transcript was produced from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Transcription model that produced it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl VideoMetadata {
    pub fn new(source: impl Into<PathBuf>, model: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            model: Some(model.into()),
        }
    }
}

/// Summary information about an indexed video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedVideo {
    /// Video ID.
    pub video_id: String,
    /// Number of indexed chunks.
    pub chunk_count: u32,
    /// Total duration in seconds.
    pub total_duration_seconds: f64,
    /// When the video was indexed.
    pub indexed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub metadata: VideoMetadata,
}

/// An indexed transcript: its summary and its chunks in order.
///
/// A silent video has a record with no chunks.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptRecord {
    #[serde(flatten)]
    pub video: IndexedVideo,
    pub chunks: Vec<StoredChunk>,
}

impl TranscriptRecord {
    /// View the chunks as a timed transcript.
    ///
    /// Each chunk becomes one segment, so SRT and WebVTT exports get one cue
    /// per chunk spanning the chunk's start and end.
    pub fn to_transcript(&self) -> Transcript {
        let segments = self
            .chunks
            .iter()
            .map(|c| TranscriptSegment::new(c.start_seconds, c.end_seconds, c.text.clone()))
            .collect();
        Transcript::new(self.video.video_id.clone(), segments)
    }
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Replace the record and every chunk of `video_id`, atomically.
    ///
    /// `embeddings[i]` belongs to `chunks[i]`. Passing no chunks records a
    /// silent video. Returns the number of chunks stored.
    async fn upsert(
        &self,
        video_id: &str,
        metadata: &VideoMetadata,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<usize>;

    /// Top `top_k` chunks by descending cosine similarity to `vector`.
    ///
    /// Equal scores are ordered by earliest start time.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&QueryFilter>,
    ) -> Result<Vec<QueryResult>>;

    /// Remove the record and every chunk of `video_id`, returning how many
    /// chunks went. Deleting an unknown id is a no-op.
    async fn delete(&self, video_id: &str) -> Result<usize>;

    /// All chunks for a video, in chunk order.
    async fn get_by_video_id(&self, video_id: &str) -> Result<Vec<StoredChunk>>;

    /// The record of a video together with its chunks.
    async fn get_video(&self, video_id: &str) -> Result<Option<TranscriptRecord>>;

    /// List all indexed videos, most recently indexed first.
    async fn list_videos(&self) -> Result<Vec<IndexedVideo>>;

    /// Get total chunk count.
    async fn count(&self) -> Result<usize>;

    /// Dimension every stored vector has.
    fn dimensions(&self) -> usize;

    /// Release backend resources.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Open the vector store selected in settings.
pub fn create_vector_store(settings: &Settings) -> Result<Arc<dyn VectorStore>> {
    let dimensions = settings.embedding.dimensions as usize;
    let store: Arc<dyn VectorStore> = match settings.vector_store.provider {
        VectorStoreProvider::Sqlite => Arc::new(SqliteVectorStore::new(&settings.sqlite_path(), dimensions)?),
        VectorStoreProvider::Memory => Arc::new(MemoryVectorStore::new(dimensions)),
    };
    Ok(store)
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Validate an upsert and build the record it writes.
pub(crate) fn prepare_upsert(
    video_id: &str,
    metadata: &VideoMetadata,
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
    dimensions: usize,
) -> Result<TranscriptRecord> {
    if chunks.len() != embeddings.len() {
        return Err(VidscribeError::Store(format!(
            "{} chunks but {} embeddings for video {}",
            chunks.len(),
            embeddings.len(),
            video_id
        )));
    }

    let indexed_at = Utc::now();
    let mut stored = chunks
        .iter()
        .zip(embeddings)
        .map(|(chunk, embedding)| {
            if chunk.video_id != video_id {
                return Err(VidscribeError::Store(format!(
                    "chunk {} belongs to video {}, not {}",
                    chunk.chunk_id, chunk.video_id, video_id
                )));
            }
            check_dimension(embedding, dimensions)?;
            Ok(StoredChunk::new(chunk, embedding.clone(), indexed_at))
        })
        .collect::<Result<Vec<_>>>()?;
    stored.sort_by_key(|c| c.index);

    Ok(TranscriptRecord {
        video: IndexedVideo {
            video_id: video_id.to_string(),
            chunk_count: stored.len() as u32,
            total_duration_seconds: stored.iter().map(|c| c.end_seconds).fold(0.0, f64::max),
            indexed_at,
            metadata: metadata.clone(),
        },
        chunks: stored,
    })
}

pub(crate) fn check_dimension(vector: &[f32], dimensions: usize) -> Result<()> {
    if vector.len() != dimensions {
        return Err(VidscribeError::Store(format!(
            "vector dimension {} does not match store dimension {}",
            vector.len(),
            dimensions
        )));
    }
    Ok(())
}

/// Score candidates against `vector` and keep the best `top_k`.
pub(crate) fn rank<'a>(
    vector: &[f32],
    candidates: impl Iterator<Item = &'a StoredChunk>,
    top_k: usize,
    filter: Option<&QueryFilter>,
) -> Vec<QueryResult> {
    let min_score = filter.and_then(|f| f.min_score);

    let mut results: Vec<QueryResult> = candidates
        .filter(|c| filter.is_none_or(|f| f.matches_video(&c.video_id)))
        .map(|c| QueryResult::scored(c, cosine_similarity(vector, &c.embedding)))
        .filter(|r| min_score.is_none_or(|min| r.score >= min))
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.start_seconds.partial_cmp(&b.start_seconds).unwrap_or(Ordering::Equal))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    results.truncate(top_k);
    results
}
