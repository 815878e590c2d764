//! Transcription module for vidscribe.
//!
//! Converts normalized audio into time-aligned transcript segments. The
//! backend sits behind the [`Transcriber`] trait; the default is OpenAI
//! Whisper.

mod format;
mod models;
mod whisper;

pub use format::{format_transcript, OutputFormat, SegmentExport, TranscriptExport};
pub use models::{close_gaps, format_timestamp, Transcript, TranscriptSegment};
pub use whisper::WhisperTranscriber;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Trait for transcription services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio file into chronologically ordered segments using
    /// the backend model named `model`.
    ///
    /// Either the whole file is transcribed or an error is returned; partial
    /// transcripts are never produced.
    async fn transcribe(&self, audio_path: &Path, model: &str) -> Result<Vec<TranscriptSegment>>;

    /// Model used when a request does not name one.
    fn default_model(&self) -> &str;
}
