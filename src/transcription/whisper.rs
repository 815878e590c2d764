//! OpenAI Whisper transcription implementation.

use super::{Transcriber, TranscriptSegment};
use crate::audio::split_audio;
use crate::config::TranscriptionSettings;
use crate::error::{Result, Stage, VidscribeError};
use crate::openai::create_client;
use async_openai::types::{AudioInput, AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::Path;
use tracing::{debug, info, instrument};

/// OpenAI Whisper-based transcriber.
pub struct WhisperTranscriber {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    language: Option<String>,
    chunk_duration_seconds: u32,
    max_concurrent_chunks: usize,
}

impl WhisperTranscriber {
    /// Create a new Whisper transcriber with default settings.
    pub fn new() -> Result<Self> {
        Self::from_settings(&TranscriptionSettings::default())
    }

    /// Create a Whisper transcriber from transcription settings.
    pub fn from_settings(settings: &TranscriptionSettings) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: settings.model.clone(),
            language: settings.language.clone().filter(|l| !l.is_empty()),
            chunk_duration_seconds: settings.chunk_duration_seconds,
            max_concurrent_chunks: settings.max_concurrent_chunks.max(1),
        })
    }

    /// Transcribe a single audio file (no splitting).
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe_single(&self, audio_path: &Path, model: &str) -> Result<Vec<TranscriptSegment>> {
        debug!("Transcribing audio file");

        let file_bytes = tokio::fs::read(audio_path).await?;

        let mut request_builder = CreateTranscriptionRequestArgs::default();
        request_builder
            .file(AudioInput::from_vec_u8(
                audio_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("audio.wav")
                    .to_string(),
                file_bytes,
            ))
            .model(model)
            .response_format(AudioResponseFormat::VerboseJson);

        if let Some(lang) = &self.language {
            request_builder.language(lang);
        }

        let request = request_builder
            .build()
            .map_err(|e| VidscribeError::Transcription(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .audio()
            .transcribe_verbose_json(request)
            .await
            .map_err(|e| VidscribeError::OpenAI {
                stage: Stage::Transcription,
                message: format!("Whisper API error: {}", e),
            })?;

        let segments = match response.segments {
            Some(segs) => segs
                .iter()
                .map(|s| TranscriptSegment::new(s.start as f64, s.end as f64, s.text.trim().to_string()))
                .filter(|s| !s.text.is_empty())
                .collect(),
            None if response.text.trim().is_empty() => Vec::new(),
            None => vec![TranscriptSegment::new(
                0.0,
                response.duration as f64,
                response.text.trim().to_string(),
            )],
        };

        debug!("Transcribed {} segments", segments.len());
        Ok(segments)
    }
}

/// Shift each piece's segments by its offset and concatenate in piece order.
fn merge_pieces(mut results: Vec<(usize, f64, Vec<TranscriptSegment>)>) -> Vec<TranscriptSegment> {
    results.sort_by_key(|(idx, _, _)| *idx);

    let mut all_segments = Vec::new();
    for (_, time_offset, mut segments) in results {
        for segment in &mut segments {
            segment.start_seconds += time_offset;
            segment.end_seconds += time_offset;
        }
        all_segments.extend(segments);
    }
    all_segments
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe(&self, audio_path: &Path, model: &str) -> Result<Vec<TranscriptSegment>> {
        // Pieces live next to the audio so they share its cleanup scope
        let scratch = match audio_path.parent() {
            Some(parent) => tempfile::tempdir_in(parent)?,
            None => tempfile::tempdir()?,
        };
        let pieces = split_audio(audio_path, scratch.path(), self.chunk_duration_seconds).await?;

        if pieces.len() == 1 {
            return self.transcribe_single(audio_path, model).await;
        }

        let piece_count = pieces.len();
        info!("Processing {} audio pieces with {}", piece_count, model);

        let mut results: Vec<(usize, f64, Vec<TranscriptSegment>)> = Vec::with_capacity(piece_count);

        let mut stream = stream::iter(pieces.into_iter().enumerate())
            .map(|(idx, (piece_path, time_offset))| async move {
                let result = self.transcribe_single(&piece_path, model).await;
                (idx, time_offset, result)
            })
            .buffer_unordered(self.max_concurrent_chunks);

        // Any failed piece fails the whole transcript
        while let Some((idx, time_offset, result)) = stream.next().await {
            match result {
                Ok(segments) => results.push((idx, time_offset, segments)),
                Err(e) => {
                    return Err(VidscribeError::Transcription(format!(
                        "Piece {} at {:.0}s failed: {}",
                        idx, time_offset, e
                    )));
                }
            }
        }

        Ok(merge_pieces(results))
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}
