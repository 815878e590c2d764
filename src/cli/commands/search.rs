//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::vector_store::QueryFilter;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    video: Option<String>,
    limit: usize,
    min_score: Option<f32>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(&settings)?;
    let filter = QueryFilter {
        video_id: video,
        min_score,
    };

    let spinner = Output::spinner("Searching...");
    let results = orchestrator.search_filtered(query, limit, &filter).await;
    spinner.finish_and_clear();
    orchestrator.shutdown().await?;

    match results {
        Ok(hits) if hits.is_empty() => {
            Output::warning("No results found matching your query.");
        }
        Ok(hits) => {
            Output::success(&format!("Found {} results", hits.len()));
            for hit in &hits {
                Output::search_result(&hit.video_id, &hit.format_timestamp(), hit.score, &hit.text);
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
