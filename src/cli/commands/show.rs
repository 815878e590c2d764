//! Show command - print the transcript of an indexed video.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{Orchestrator, TranscriptRecord};
use crate::transcription::{format_transcript, OutputFormat};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Run the show command.
pub async fn run_show(video_id: &str, format: &str, output: Option<PathBuf>, settings: Settings) -> Result<()> {
    let format: OutputFormat = format.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let orchestrator = Orchestrator::new(&settings)?;
    let record = orchestrator.get_transcript(video_id).await?;
    orchestrator.shutdown().await?;

    match record {
        Some(record) => write_transcript(&record, format, output.as_deref()),
        None => {
            Output::error(&format!("No indexed transcript for video ID: {}", video_id));
            Output::info("Use 'vidscribe list' to see indexed videos.");
            Err(anyhow::anyhow!("video {} is not indexed", video_id))
        }
    }
}

/// Render a transcript to a file, or to stdout when no file (or `-`) is given.
pub(super) fn write_transcript(record: &TranscriptRecord, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let rendered = format_transcript(&record.to_transcript(), format)?;

    match output {
        Some(path) if path != Path::new("-") => {
            std::fs::write(path, &rendered)?;
            Output::success(&format!(
                "Wrote transcript of {} to {} ({} chunks)",
                record.video.video_id,
                path.display(),
                record.chunks.len()
            ));
        }
        _ => println!("{}", rendered),
    }

    Ok(())
}
