//! Transcript export formats (JSON, SRT, WebVTT).

use super::Transcript;
use serde::Serialize;
use std::fmt::Write;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Srt,
    Vtt,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "srt" => Ok(OutputFormat::Srt),
            "vtt" | "webvtt" => Ok(OutputFormat::Vtt),
            _ => Err(format!("Unknown format: {}. Use json, srt, or vtt.", s)),
        }
    }
}

/// JSON shape of an exported transcript.
#[derive(Debug, Serialize)]
pub struct TranscriptExport<'a> {
    pub video_id: &'a str,
    pub duration_seconds: f64,
    pub text: &'a str,
    pub segments: Vec<SegmentExport<'a>>,
}

#[derive(Debug, Serialize)]
pub struct SegmentExport<'a> {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: &'a str,
}

impl<'a> From<&'a Transcript> for TranscriptExport<'a> {
    fn from(transcript: &'a Transcript) -> Self {
        Self {
            video_id: &transcript.video_id,
            duration_seconds: transcript.duration_seconds,
            text: &transcript.full_text,
            segments: transcript
                .segments
                .iter()
                .map(|s| SegmentExport {
                    start_seconds: s.start_seconds,
                    end_seconds: s.end_seconds,
                    text: &s.text,
                })
                .collect(),
        }
    }
}

/// Render a transcript in the requested format.
pub fn format_transcript(transcript: &Transcript, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(&TranscriptExport::from(transcript)),
        OutputFormat::Srt => Ok(render_cues(transcript, String::new(), ',')),
        OutputFormat::Vtt => Ok(render_cues(transcript, String::from("WEBVTT\n\n"), '.')),
    }
}

/// SRT and WebVTT cues differ only in header and millisecond separator.
fn render_cues(transcript: &Transcript, mut out: String, ms_separator: char) -> String {
    for (i, segment) in transcript.segments.iter().enumerate() {
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            cue_timestamp(segment.start_seconds, ms_separator),
            cue_timestamp(segment.end_seconds, ms_separator),
            segment.text
        );
    }
    out
}

/// HH:MM:SS<sep>mmm
fn cue_timestamp(seconds: f64, ms_separator: char) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let ms = total_ms % 1000;

    format!("{:02}:{:02}:{:02}{}{:03}", hours, minutes, secs, ms_separator, ms)
}
