//! Transcribe command implementation.

use super::show::write_transcript;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{JobStatus, Orchestrator};
use crate::transcription::OutputFormat;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Run the transcribe command.
pub async fn run_transcribe(
    input: &Path,
    model: Option<&str>,
    format: Option<&str>,
    output: Option<PathBuf>,
    settings: Settings,
) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Transcribe, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'vidscribe doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    // Validate before doing any work
    let format: Option<OutputFormat> = match (format, &output) {
        (Some(f), _) => Some(f.parse().map_err(|e: String| anyhow::anyhow!(e))?),
        (None, Some(_)) => Some(OutputFormat::Json),
        (None, None) => None,
    };

    if !input.is_file() {
        Output::error(&format!("No such file: {}", input.display()));
        return Err(anyhow::anyhow!("input not found: {}", input.display()));
    }

    Output::info(&format!("Processing: {}", input.display()));

    let orchestrator = Orchestrator::new(&settings)?;

    let spinner = Output::spinner("Extracting, transcribing and indexing...");
    let job = orchestrator.process_video(input, model).await;
    spinner.finish_and_clear();
    let job = job?;

    Output::job_summary(&job);

    if job.status == JobStatus::Indexed {
        if let Some(format) = format {
            if let Some(record) = orchestrator.get_transcript(&job.video_id).await? {
                write_transcript(&record, format, output.as_deref())?;
            }
        }
    }

    orchestrator.shutdown().await?;

    match job.error {
        Some(error) => Err(anyhow::anyhow!("{}", error)),
        None => Ok(()),
    }
}
