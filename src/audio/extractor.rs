//! Audio track extraction with ffmpeg.

use super::AudioExtractor;
use crate::error::{Result, VidscribeError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Normalized audio produced by an [`AudioExtractor`].
///
/// Owns the temporary directory the audio lives in. Dropping the value removes
/// the directory and everything in it.
#[derive(Debug)]
pub struct ExtractedAudio {
    dir: TempDir,
    path: PathBuf,
}

impl ExtractedAudio {
    /// Wrap a file that lives inside `dir`.
    pub fn new(dir: TempDir, file_name: &str) -> Self {
        let path = dir.path().join(file_name);
        Self { dir, path }
    }

    /// Path of the normalized audio file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The scoped directory holding the audio.
    pub fn scope(&self) -> &Path {
        self.dir.path()
    }
}

/// Extracts a mono PCM WAV track from a video with ffmpeg.
pub struct FfmpegExtractor {
    temp_root: PathBuf,
    sample_rate: u32,
    channels: u32,
}

impl FfmpegExtractor {
    /// Create an extractor producing 16 kHz mono audio under `temp_root`.
    pub fn new(temp_root: impl Into<PathBuf>) -> Self {
        Self::with_format(temp_root, 16_000, 1)
    }

    /// Create an extractor with a custom output format.
    pub fn with_format(temp_root: impl Into<PathBuf>, sample_rate: u32, channels: u32) -> Self {
        Self {
            temp_root: temp_root.into(),
            sample_rate,
            channels,
        }
    }

    /// File name of the normalized output for a given input.
    fn output_name(video_path: &Path) -> String {
        let stem = video_path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("audio");
        format!("{}.wav", stem)
    }

    /// Make sure the input is readable media with at least one audio stream.
    async fn probe_audio_stream(video_path: &Path) -> Result<()> {
        let result = Command::new("ffprobe")
            .arg("-v").arg("error")
            .arg("-print_format").arg("json")
            .arg("-show_streams")
            .arg(video_path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VidscribeError::ToolNotFound("ffprobe".into()));
            }
            Err(e) => {
                return Err(VidscribeError::Extraction(format!("ffprobe execution failed: {e}")));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VidscribeError::Extraction(format!(
                "unreadable input {}: {}",
                video_path.display(),
                stderr.trim()
            )));
        }

        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|_| VidscribeError::Extraction("Invalid ffprobe output".into()))?;

        if has_audio_stream(&parsed) {
            Ok(())
        } else {
            Err(VidscribeError::Extraction(format!(
                "{} has no audio track",
                video_path.display()
            )))
        }
    }
}

/// Whether ffprobe's `-show_streams` JSON lists an audio stream.
fn has_audio_stream(probe: &serde_json::Value) -> bool {
    probe["streams"]
        .as_array()
        .map(|streams| streams.iter().any(|s| s["codec_type"] == "audio"))
        .unwrap_or(false)
}

#[async_trait]
impl AudioExtractor for FfmpegExtractor {
    #[instrument(skip(self), fields(video = %video_path.display()))]
    async fn extract(&self, video_path: &Path) -> Result<ExtractedAudio> {
        if !video_path.is_file() {
            return Err(VidscribeError::Extraction(format!(
                "input not found: {}",
                video_path.display()
            )));
        }

        Self::probe_audio_stream(video_path).await?;

        std::fs::create_dir_all(&self.temp_root)?;
        let dir = tempfile::Builder::new()
            .prefix("vidscribe-")
            .tempdir_in(&self.temp_root)?;
        let audio = ExtractedAudio::new(dir, &Self::output_name(video_path));

        debug!("Extracting audio to {:?}", audio.path());

        let result = Command::new("ffmpeg")
            .arg("-nostdin")
            .arg("-i").arg(video_path)
            .arg("-vn")
            .arg("-ac").arg(self.channels.to_string())
            .arg("-ar").arg(self.sample_rate.to_string())
            .arg("-acodec").arg("pcm_s16le")
            .arg("-y")
            .arg("-loglevel").arg("error")
            .arg(audio.path())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        match result {
            Ok(out) if out.status.success() => {
                info!("Extracted audio track ({} Hz, {} ch)", self.sample_rate, self.channels);
                Ok(audio)
            }
            Ok(out) => {
                let err = String::from_utf8_lossy(&out.stderr);
                Err(VidscribeError::Extraction(format!(
                    "ffmpeg exited with {}: {}",
                    out.status,
                    err.trim()
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(VidscribeError::ToolNotFound("ffmpeg".into()))
            }
            Err(e) => Err(VidscribeError::Extraction(format!("ffmpeg error: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_name_is_derived_from_input() {
        assert_eq!(FfmpegExtractor::output_name(Path::new("/tmp/talk.mp4")), "talk.wav");
        assert_eq!(FfmpegExtractor::output_name(Path::new("clip")), "clip.wav");
    }

    #[test]
    fn test_has_audio_stream() {
        let with_audio = serde_json::json!({
            "streams": [{"codec_type": "video"}, {"codec_type": "audio"}]
        });
        let video_only = serde_json::json!({"streams": [{"codec_type": "video"}]});

        assert!(has_audio_stream(&with_audio));
        assert!(!has_audio_stream(&video_only));
        assert!(!has_audio_stream(&serde_json::json!({})));
    }

    #[test]
    fn test_extracted_audio_removes_scope_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let audio = ExtractedAudio::new(dir, "a.wav");
        std::fs::write(audio.path(), b"RIFF").unwrap();
        let scope = audio.scope().to_path_buf();
        assert!(scope.exists());

        drop(audio);
        assert!(!scope.exists());
    }

    #[tokio::test]
    async fn test_missing_input_is_an_extraction_error() {
        let root = tempfile::tempdir().unwrap();
        let extractor = FfmpegExtractor::new(root.path());
        let err = extractor
            .extract(Path::new("/definitely/not/here.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, VidscribeError::Extraction(_)));
    }
}
