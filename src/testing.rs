//! Deterministic in-process backends for exercising the pipeline in tests.

use crate::audio::{AudioExtractor, ExtractedAudio};
use crate::embedding::Embedder;
use crate::error::{Result, VidscribeError};
use crate::transcription::{Transcriber, TranscriptSegment};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Notify;

/// How a mock backend answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Succeed,
    Fail,
    Hang,
}

/// Writes a placeholder WAV into a fresh temp dir for every existing input.
pub struct StubExtractor {
    mode: Mode,
    scopes: Mutex<Vec<PathBuf>>,
}

impl StubExtractor {
    pub fn new() -> Self {
        Self::with_mode(Mode::Succeed)
    }

    pub fn failing() -> Self {
        Self::with_mode(Mode::Fail)
    }

    pub fn hanging() -> Self {
        Self::with_mode(Mode::Hang)
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            scopes: Mutex::new(Vec::new()),
        }
    }

    /// Every scratch directory handed out so far.
    pub fn scopes(&self) -> Vec<PathBuf> {
        self.scopes.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioExtractor for StubExtractor {
    async fn extract(&self, video_path: &Path) -> Result<ExtractedAudio> {
        match self.mode {
            Mode::Fail => return Err(VidscribeError::Extraction("no audio stream".into())),
            Mode::Hang => std::future::pending::<()>().await,
            Mode::Succeed => {}
        }

        if !video_path.is_file() {
            return Err(VidscribeError::Extraction(format!(
                "input not found: {}",
                video_path.display()
            )));
        }

        let audio = ExtractedAudio::new(TempDir::new()?, "audio.wav");
        std::fs::write(audio.path(), b"RIFF")?;
        self.scopes.lock().unwrap().push(audio.scope().to_path_buf());
        Ok(audio)
    }
}

/// Returns a fixed segment list, or fails once a given number of segments
/// have been "heard".
pub struct ScriptedTranscriber {
    segments: Vec<TranscriptSegment>,
    fail_after: Option<usize>,
    fail_from_call: Option<usize>,
    gate: Option<Arc<Notify>>,
    hang: bool,
    models: Mutex<Vec<String>>,
}

impl ScriptedTranscriber {
    pub const DEFAULT_MODEL: &'static str = "scripted-1";

    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        Self {
            segments,
            fail_after: None,
            fail_from_call: None,
            gate: None,
            hang: false,
            models: Mutex::new(Vec::new()),
        }
    }

    /// Nothing was said.
    pub fn silent() -> Self {
        Self::new(Vec::new())
    }

    /// Fails after producing `produced` of the scripted segments.
    pub fn failing_after(segments: Vec<TranscriptSegment>, produced: usize) -> Self {
        Self {
            fail_after: Some(produced),
            ..Self::new(segments)
        }
    }

    /// Answers the first `calls` requests, then fails every later one.
    pub fn failing_from_call(segments: Vec<TranscriptSegment>, calls: usize) -> Self {
        Self {
            fail_from_call: Some(calls),
            ..Self::new(segments)
        }
    }

    /// Waits for `gate` to be notified before answering.
    pub fn gated(segments: Vec<TranscriptSegment>, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(segments)
        }
    }

    /// Never answers.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.models.lock().unwrap().len()
    }

    /// The model each request asked for, in call order.
    pub fn models(&self) -> Vec<String> {
        self.models.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, audio_path: &Path, model: &str) -> Result<Vec<TranscriptSegment>> {
        let call = {
            let mut models = self.models.lock().unwrap();
            models.push(model.to_string());
            models.len() - 1
        };
        assert!(audio_path.is_file(), "audio should exist while transcribing");

        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        if self.fail_from_call.is_some_and(|n| call >= n) {
            return Err(VidscribeError::Transcription("backend unavailable".into()));
        }

        match self.fail_after {
            Some(produced) => Err(VidscribeError::Transcription(format!(
                "backend dropped the connection after {} of {} segments",
                produced,
                self.segments.len()
            ))),
            None => Ok(self.segments.clone()),
        }
    }

    fn default_model(&self) -> &str {
        Self::DEFAULT_MODEL
    }
}

/// Bag-of-words embedder: each word bumps one hashed coordinate, and the
/// result is normalized. Texts sharing words score close together.
pub struct HashEmbedder {
    dimensions: usize,
    batch_size: usize,
    mode: Mode,
    batches: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self::with_batch_size(dimensions, usize::MAX)
    }

    pub fn with_batch_size(dimensions: usize, batch_size: usize) -> Self {
        Self {
            dimensions,
            batch_size: batch_size.max(1),
            mode: Mode::Succeed,
            batches: AtomicUsize::new(0),
        }
    }

    pub fn failing(dimensions: usize) -> Self {
        Self {
            mode: Mode::Fail,
            ..Self::new(dimensions)
        }
    }

    pub fn hanging(dimensions: usize) -> Self {
        Self {
            mode: Mode::Hang,
            ..Self::new(dimensions)
        }
    }

    /// Number of backend round trips made so far.
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        for word in text.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if word.is_empty() {
                continue;
            }
            // FNV-1a
            let hash = word
                .bytes()
                .fold(0xcbf29ce484222325u64, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3));
            v[(hash % self.dimensions as u64) as usize] += 1.0;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| VidscribeError::Embedding("empty response".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self.mode {
            Mode::Fail => return Err(VidscribeError::Embedding("embedding backend unavailable".into())),
            Mode::Hang => std::future::pending::<()>().await,
            Mode::Succeed => {}
        }

        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            self.batches.fetch_add(1, Ordering::SeqCst);
            out.extend(batch.iter().map(|t| self.vector(t)));
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// `count` contiguous two-second segments, every third one ending a sentence.
pub fn segments(count: usize) -> Vec<TranscriptSegment> {
    (0..count)
        .map(|i| {
            let start = i as f64 * 2.0;
            let mut text = format!("segment {} talks about topic{}", i, i % 4);
            if i % 3 == 2 {
                text.push('.');
            }
            TranscriptSegment::new(start, start + 2.0, text)
        })
        .collect()
}
