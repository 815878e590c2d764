//! Data models for transcription.

use crate::error::{Result, VidscribeError};
use serde::{Deserialize, Serialize};

/// A complete transcript with segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Video ID this transcript belongs to.
    pub video_id: String,
    /// Individual transcript segments with timestamps.
    pub segments: Vec<TranscriptSegment>,
    /// Full transcript text (concatenated segments).
    pub full_text: String,
    /// Total duration in seconds.
    pub duration_seconds: f64,
}

impl Transcript {
    /// Create a new transcript from segments.
    pub fn new(video_id: String, segments: Vec<TranscriptSegment>) -> Self {
        let full_text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let duration_seconds = segments
            .last()
            .map(|s| s.end_seconds)
            .unwrap_or(0.0);

        Self {
            video_id,
            segments,
            full_text,
            duration_seconds,
        }
    }

    /// Whether nothing was said.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// A single segment of a transcript with timestamp information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds.
    pub start_seconds: f64,
    /// End time in seconds.
    pub end_seconds: f64,
    /// Transcribed text content.
    pub text: String,
}

impl TranscriptSegment {
    /// Create a new transcript segment.
    pub fn new(start_seconds: f64, end_seconds: f64, text: String) -> Self {
        Self {
            start_seconds,
            end_seconds,
            text,
        }
    }

    /// Duration of this segment in seconds.
    pub fn duration(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// Normalize backend output into a chronological sequence without holes.
///
/// Segments must be ordered by start time. Overlaps are trimmed so each
/// segment starts where the previous one ended. A gap no longer than
/// `silence_threshold` is a pause and goes to the earlier segment; a longer
/// gap is silence and goes to the later one, as does any silence before the
/// first segment. The result covers `0..end` of the last segment.
pub fn close_gaps(
    segments: Vec<TranscriptSegment>,
    silence_threshold: f64,
) -> Result<Vec<TranscriptSegment>> {
    let mut out: Vec<TranscriptSegment> = Vec::with_capacity(segments.len());
    let mut last_start = f64::NEG_INFINITY;

    for mut seg in segments {
        if !seg.start_seconds.is_finite() || !seg.end_seconds.is_finite() {
            return Err(VidscribeError::Transcription(format!(
                "segment has a non-finite timestamp: {:?}",
                seg
            )));
        }
        if seg.end_seconds < seg.start_seconds {
            return Err(VidscribeError::Transcription(format!(
                "segment ends before it starts ({:.2}s < {:.2}s)",
                seg.end_seconds, seg.start_seconds
            )));
        }

        if seg.start_seconds < last_start {
            return Err(VidscribeError::Transcription(format!(
                "segments out of order at {:.2}s",
                seg.start_seconds
            )));
        }
        last_start = seg.start_seconds;

        match out.last_mut() {
            Some(prev) => {
                if seg.start_seconds < prev.end_seconds {
                    seg.start_seconds = prev.end_seconds;
                    seg.end_seconds = seg.end_seconds.max(seg.start_seconds);
                } else if seg.start_seconds - prev.end_seconds <= silence_threshold {
                    prev.end_seconds = seg.start_seconds;
                } else {
                    seg.start_seconds = prev.end_seconds;
                }
            }
            None => {
                seg.start_seconds = 0.0;
                seg.end_seconds = seg.end_seconds.max(0.0);
            }
        }

        out.push(seg);
    }

    Ok(out)
}

/// Format seconds as MM:SS or HH:MM:SS.
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment::new(start, end, text.to_string())
    }

    #[test]
    fn test_transcript_creation() {
        let segments = vec![seg(0.0, 5.0, "Hello world"), seg(5.0, 10.0, "This is a test")];

        let transcript = Transcript::new("test_video".to_string(), segments);

        assert_eq!(transcript.video_id, "test_video");
        assert_eq!(transcript.full_text, "Hello world This is a test");
        assert_eq!(transcript.duration_seconds, 10.0);
        assert!(!transcript.is_empty());
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(65.0), "01:05");
        assert_eq!(format_timestamp(3665.0), "01:01:05");
    }

    #[test]
    fn test_close_gaps_bridges_short_pauses() {
        let out = close_gaps(vec![seg(0.0, 4.0, "a"), seg(5.0, 8.0, "b")], 2.0).unwrap();
        assert_eq!(out[0].end_seconds, 5.0);
        assert_eq!(out[1].start_seconds, 5.0);
    }

    #[test]
    fn test_close_gaps_gives_long_silence_to_next_segment() {
        let out = close_gaps(vec![seg(0.0, 4.0, "a"), seg(30.0, 32.0, "b")], 2.0).unwrap();
        assert_eq!(out[0].end_seconds, 4.0);
        assert_eq!(out[1].start_seconds, 4.0);
        assert_eq!(out[1].end_seconds, 32.0);
    }

    #[test]
    fn test_close_gaps_leaves_no_holes() {
        let out = close_gaps(
            vec![
                seg(3.0, 5.0, "late start"),
                seg(5.5, 7.0, "pause"),
                seg(40.0, 41.0, "after a long silence"),
                seg(40.5, 42.0, "overlap"),
            ],
            1.0,
        )
        .unwrap();

        assert_eq!(out[0].start_seconds, 0.0);
        assert!(out.windows(2).all(|w| w[0].end_seconds == w[1].start_seconds));
        assert_eq!(out.last().unwrap().end_seconds, 42.0);
    }

    #[test]
    fn test_close_gaps_trims_overlap() {
        let out = close_gaps(vec![seg(0.0, 4.2, "a"), seg(4.0, 6.0, "b")], 0.5).unwrap();
        assert_eq!(out[1].start_seconds, 4.2);
        assert_eq!(out[1].end_seconds, 6.0);
    }

    #[test]
    fn test_close_gaps_rejects_out_of_order() {
        let err = close_gaps(vec![seg(5.0, 6.0, "b"), seg(0.0, 1.0, "a")], 1.0).unwrap_err();
        assert!(matches!(err, VidscribeError::Transcription(_)));
    }

    #[test]
    fn test_close_gaps_checks_order_against_reported_starts() {
        let err = close_gaps(
            vec![seg(0.0, 4.0, "a"), seg(30.0, 32.0, "b"), seg(10.0, 12.0, "c")],
            2.0,
        )
        .unwrap_err();
        assert!(matches!(err, VidscribeError::Transcription(_)));
    }

    #[test]
    fn test_close_gaps_empty() {
        assert!(close_gaps(Vec::new(), 1.0).unwrap().is_empty());
    }
}
