//! vidscribe - Video Transcription and Semantic Search
//!
//! Turns uploaded videos into searchable transcripts.
//!
//! # Overview
//!
//! vidscribe allows you to:
//! - Extract the audio track of a video and transcribe it with timestamps
//! - Split transcripts into sentence-aware chunks and embed them
//! - Search every indexed video semantically, down to the time range
//! - Export transcripts as JSON, SRT or WebVTT
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `audio` - Audio extraction and splitting (ffmpeg)
//! - `transcription` - Speech-to-text transcription
//! - `chunking` - Transcript chunking
//! - `embedding` - Embedding generation (OpenAI, Ollama)
//! - `vector_store` - Vector database abstraction (SQLite, memory)
//! - `orchestrator` - Pipeline coordination and job tracking
//!
//! # Example
//!
//! ```rust,no_run
//! use vidscribe::config::Settings;
//! use vidscribe::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(&settings)?;
//!
//!     let job = orchestrator.process_video("lecture.mp4", None).await?;
//!     println!("{}: {} chunks", job.status, job.chunks_indexed);
//!
//!     for hit in orchestrator.search(None, "gradient descent", 5).await? {
//!         println!("{} @ {}", hit.video_id, hit.format_timestamp());
//!     }
//!
//!     orchestrator.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod openai;
pub mod orchestrator;
pub mod transcription;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, VidscribeError};
