//! Audio extraction and processing.
//!
//! Turns an uploaded video into normalized audio for the transcription
//! backend, and splits long audio into pieces.

mod extractor;
mod split;

pub use extractor::{ExtractedAudio, FfmpegExtractor};
pub use split::{probe_duration, split_audio};

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Trait for audio extraction implementations.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Produce normalized audio for a video file.
    ///
    /// The returned value owns its scratch location; nothing is left behind
    /// once it is dropped.
    async fn extract(&self, video_path: &Path) -> Result<ExtractedAudio>;
}
