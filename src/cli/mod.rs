//! CLI module for vidscribe.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// vidscribe - Video Transcription and Semantic Search
///
/// Extracts, transcribes and indexes the speech in videos so it can be
/// searched by meaning.
#[derive(Parser, Debug)]
#[command(name = "vidscribe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "VIDSCRIBE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check system requirements and configuration
    Doctor,

    /// Transcribe and index a local video file
    Transcribe {
        /// Path to the video file
        input: PathBuf,

        /// Transcription model (defaults to transcription.model)
        #[arg(long)]
        model: Option<String>,

        /// Also write the transcript in this format (json, srt, vtt); SRT and
        /// VTT get one cue per indexed chunk
        #[arg(long)]
        format: Option<String>,

        /// File to write the transcript to (stdout if --format is given without it)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Search indexed transcripts
    Search {
        /// Search query
        query: String,

        /// Only search this video
        #[arg(long)]
        video: Option<String>,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Minimum similarity score (-1.0 to 1.0)
        #[arg(short, long)]
        min_score: Option<f32>,
    },

    /// List indexed videos
    List {
        /// Maximum number of videos to show
        #[arg(short, long, default_value = "50")]
        limit: usize,

        /// Number of videos to skip
        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Print the transcript of an indexed video
    Show {
        /// Video ID
        video_id: String,

        /// Output format (json, srt, vtt); SRT and VTT get one cue per
        /// indexed chunk
        #[arg(long, default_value = "json")]
        format: String,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete an indexed video
    Delete {
        /// Video ID
        video_id: String,
    },

    /// Transcribe an indexed video again from its recorded source
    Reprocess {
        /// Video ID
        video_id: String,

        /// Transcription model; must differ from the one the video was
        /// indexed with (defaults to that same model)
        #[arg(long)]
        model: Option<String>,
    },

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the current configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
