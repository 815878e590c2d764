//! List command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(limit: usize, offset: usize, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(&settings)?;
    let videos = orchestrator.list_transcripts(limit, offset).await;
    orchestrator.shutdown().await?;

    let videos = match videos {
        Ok(videos) => videos,
        Err(e) => {
            Output::error(&format!("Failed to list videos: {}", e));
            return Err(e.into());
        }
    };

    if videos.is_empty() {
        Output::info("No videos indexed yet. Use 'vidscribe transcribe <file>' to add one.");
        return Ok(());
    }

    Output::header(&format!("Indexed Videos ({})", videos.len()));
    println!();

    for video in &videos {
        Output::video_info(
            &video.video_id,
            video.chunk_count,
            video.total_duration_seconds,
            video.metadata.model.as_deref(),
            &video.indexed_at.format("%Y-%m-%d %H:%M").to_string(),
        );
    }

    let total_chunks: u32 = videos.iter().map(|v| v.chunk_count).sum();
    println!();
    Output::kv("Videos", &videos.len().to_string());
    Output::kv("Chunks", &total_chunks.to_string());

    Ok(())
}
