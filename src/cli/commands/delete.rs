//! Delete command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the delete command.
pub async fn run_delete(video_id: &str, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(&settings)?;
    let deleted = orchestrator.delete_transcript(video_id).await;
    orchestrator.shutdown().await?;

    match deleted? {
        0 => Output::warning(&format!("Nothing indexed for video {}", video_id)),
        n => Output::success(&format!("Deleted video {} ({} chunks)", video_id, n)),
    }

    Ok(())
}
