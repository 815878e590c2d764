//! Transcript chunking for embedding and retrieval.
//!
//! Groups consecutive transcript segments into bounded-size chunks that keep
//! a back-reference to the video and time range they came from.

mod sentence;

pub use sentence::SentenceChunker;

use crate::config::ChunkingSettings;
use crate::transcription::format_timestamp;
use serde::{Deserialize, Serialize};

/// A chunk of transcript text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `<video_id>:<index>`.
    pub chunk_id: String,
    /// Video this chunk was cut from.
    pub video_id: String,
    /// Position of this chunk in the video.
    pub index: usize,
    /// Text of the contiguous segments, joined by spaces.
    pub text: String,
    /// Start time in seconds.
    pub start_seconds: f64,
    /// End time in seconds.
    pub end_seconds: f64,
}

impl Chunk {
    /// Create a chunk, deriving its id from the video and index.
    pub fn new(video_id: &str, index: usize, text: String, start_seconds: f64, end_seconds: f64) -> Self {
        Self {
            chunk_id: chunk_id(video_id, index),
            video_id: video_id.to_string(),
            index,
            text,
            start_seconds,
            end_seconds,
        }
    }

    /// Duration of this chunk in seconds.
    pub fn duration(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }

    /// Format the start time for display.
    pub fn format_timestamp(&self) -> String {
        format_timestamp(self.start_seconds)
    }
}

/// Id of the `index`-th chunk of a video.
pub fn chunk_id(video_id: &str, index: usize) -> String {
    format!("{}:{}", video_id, index)
}

/// Size bounds for chunking, in characters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    /// A chunk closes once it reaches this many characters.
    pub target_chars: usize,
    /// A sentence boundary only closes a chunk at least this long.
    pub min_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_chars: 1000,
            min_chars: 200,
        }
    }
}

impl From<&ChunkingSettings> for ChunkingConfig {
    fn from(settings: &ChunkingSettings) -> Self {
        Self {
            target_chars: settings.target_chars,
            min_chars: settings.min_chars,
        }
    }
}
