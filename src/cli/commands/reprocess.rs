//! Reprocess command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the reprocess command.
pub async fn run_reprocess(video_id: &str, model: Option<&str>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Transcribe, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'vidscribe doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(&settings)?;

    let job_id = match orchestrator.reprocess(video_id, model).await {
        Ok(job_id) => job_id,
        Err(e) => {
            Output::error(&format!("Cannot reprocess {}: {}", video_id, e));
            orchestrator.shutdown().await?;
            return Err(e.into());
        }
    };

    let spinner = Output::spinner("Extracting, transcribing and indexing...");
    let job = orchestrator.wait(job_id).await;
    spinner.finish_and_clear();
    orchestrator.shutdown().await?;

    let job = job?;
    Output::job_summary(&job);

    match job.error {
        Some(error) => Err(anyhow::anyhow!("{}", error)),
        None => Ok(()),
    }
}
