//! Splitting long audio into pieces the transcription backend accepts.

use crate::error::{Result, VidscribeError};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Segments a long audio file into smaller pieces.
///
/// Each piece is approximately `chunk_seconds` long. Returns tuples of
/// (piece_path, offset_seconds), in order.
#[instrument(skip_all)]
pub async fn split_audio(
    source: &Path,
    output_dir: &Path,
    chunk_seconds: u32,
) -> Result<Vec<(PathBuf, f64)>> {
    std::fs::create_dir_all(output_dir)?;

    let total_duration = probe_duration(source).await?;
    info!("Total audio duration: {:.1}s", total_duration);

    let offsets = piece_offsets(total_duration, chunk_seconds as f64);

    // Short audio doesn't need splitting
    if offsets.len() <= 1 {
        return Ok(vec![(source.to_path_buf(), 0.0)]);
    }

    let base_name = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");

    let mut pieces = Vec::with_capacity(offsets.len());
    for (idx, (offset, length)) in offsets.into_iter().enumerate() {
        let piece_path = output_dir.join(format!("{}_{:04}.wav", base_name, idx));
        extract_piece(source, &piece_path, offset, length).await?;

        debug!("Created piece {} at offset {:.1}s", idx, offset);
        pieces.push((piece_path, offset));
    }

    info!("Created {} audio pieces", pieces.len());
    Ok(pieces)
}

/// (offset, length) of each piece for a file of `total` seconds.
fn piece_offsets(total: f64, chunk_len: f64) -> Vec<(f64, f64)> {
    if total <= chunk_len || chunk_len <= 0.0 {
        return vec![(0.0, total)];
    }

    let mut offsets = Vec::new();
    let mut offset = 0.0;
    while offset < total {
        offsets.push((offset, chunk_len.min(total - offset)));
        offset += chunk_len;
    }
    offsets
}

/// Extracts a time range from an audio file.
async fn extract_piece(source: &Path, dest: &Path, start: f64, length: f64) -> Result<()> {
    // WAV input can be cut without re-encoding
    let copy_result = Command::new("ffmpeg")
        .arg("-nostdin")
        .arg("-ss").arg(format!("{:.3}", start))
        .arg("-i").arg(source)
        .arg("-t").arg(format!("{:.3}", length))
        .arg("-c").arg("copy")
        .arg("-y")
        .arg("-loglevel").arg("warning")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await;

    if let Ok(status) = copy_result {
        if status.success() && dest.exists() {
            return Ok(());
        }
    }

    warn!("Stream copy failed, re-encoding piece");

    let encode_result = Command::new("ffmpeg")
        .arg("-nostdin")
        .arg("-ss").arg(format!("{:.3}", start))
        .arg("-i").arg(source)
        .arg("-t").arg(format!("{:.3}", length))
        .arg("-acodec").arg("pcm_s16le")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await;

    match encode_result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(VidscribeError::Transcription(format!("Audio split failed: {err}")))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(VidscribeError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(VidscribeError::Transcription(format!("ffmpeg error: {e}"))),
    }
}

/// Queries the duration of an audio file using ffprobe with JSON output.
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let result = Command::new("ffprobe")
        .arg("-v").arg("quiet")
        .arg("-print_format").arg("json")
        .arg("-show_format")
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(VidscribeError::ToolNotFound("ffprobe".into()));
        }
        Err(e) => {
            return Err(VidscribeError::Transcription(format!("ffprobe failed: {e}")));
        }
    };

    if !output.status.success() {
        return Err(VidscribeError::Transcription("ffprobe returned error".into()));
    }

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|_| VidscribeError::Transcription("Invalid ffprobe output".into()))?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| VidscribeError::Transcription("Could not determine audio duration".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_audio_is_one_piece() {
        assert_eq!(piece_offsets(42.0, 600.0), vec![(0.0, 42.0)]);
    }

    #[test]
    fn test_pieces_cover_the_whole_file() {
        let pieces = piece_offsets(1500.0, 600.0);
        assert_eq!(pieces, vec![(0.0, 600.0), (600.0, 600.0), (1200.0, 300.0)]);

        let covered: f64 = pieces.iter().map(|(_, len)| len).sum();
        assert_eq!(covered, 1500.0);
    }
}
