//! CLI output formatting utilities.

use crate::orchestrator::{JobStatus, VideoJob};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        eprintln!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        eprintln!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print an indexed video.
    pub fn video_info(id: &str, chunks: u32, duration: f64, model: Option<&str>, indexed_at: &str) {
        println!(
            "  {} {} ({} chunks, {}, {}, indexed {})",
            style("*").cyan(),
            style(id).bold(),
            chunks,
            format_duration(duration),
            model.unwrap_or("unknown model"),
            style(indexed_at).dim()
        );
    }

    /// Print search result.
    pub fn search_result(video_id: &str, timestamp: &str, score: f32, content: &str) {
        println!(
            "\n{} {} @ {} (score: {:.2})",
            style(">>").green(),
            style(video_id).bold(),
            style(timestamp).cyan(),
            score
        );
        println!("   {}", content_preview(content, 200));
    }

    /// Print the outcome of a job.
    pub fn job_summary(job: &VideoJob) {
        match job.status {
            JobStatus::Indexed => Output::success(&format!(
                "Indexed video {} ({} chunks, {})",
                job.video_id, job.chunks_indexed, job.model
            )),
            JobStatus::Failed => {
                let reason = job
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".to_string());
                Output::error(&format!("Job {} failed: {}", job.id, reason));
            }
            status => Output::info(&format!("Job {} is {}", job.id, status)),
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Format duration in seconds to a human-readable string.
fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Truncate content with ellipsis, on a character boundary.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(42.0), "42s");
        assert_eq!(format_duration(125.0), "2m 5s");
        assert_eq!(format_duration(3725.0), "1h 2m 5s");
    }

    #[test]
    fn test_content_preview_respects_char_boundaries() {
        assert_eq!(content_preview("short", 10), "short");
        assert_eq!(content_preview("ééééé", 3), "ééé...");
        assert_eq!(content_preview("a\nb", 10), "a b");
    }
}
