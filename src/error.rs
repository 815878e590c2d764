//! Error types for vidscribe.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Pipeline stage that talks to an external backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Extraction,
    Transcription,
    Embedding,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Extraction => write!(f, "extraction"),
            Stage::Transcription => write!(f, "transcription"),
            Stage::Embedding => write!(f, "embedding"),
        }
    }
}

/// Library-level error type for vidscribe operations.
#[derive(Error, Debug)]
pub enum VidscribeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audio extraction failed: {0}")]
    Extraction(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("{stage} timed out after {limit:?}")]
    Timeout { stage: Stage, limit: Duration },

    #[error("Job was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error ({stage}): {message}")]
    OpenAI { stage: Stage, message: String },

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

/// Classification of a failure, recorded on a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Extraction,
    Transcription,
    Embedding,
    Store,
    Timeout,
    Cancelled,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Extraction => "extraction_error",
            ErrorKind::Transcription => "transcription_error",
            ErrorKind::Embedding => "embedding_error",
            ErrorKind::Store => "store_error",
            ErrorKind::Timeout => "timeout_error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal_error",
        };
        f.write_str(name)
    }
}

impl VidscribeError {
    /// The kind a job failing with this error is recorded under.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VidscribeError::Extraction(_) | VidscribeError::ToolNotFound(_) => ErrorKind::Extraction,
            VidscribeError::Transcription(_) => ErrorKind::Transcription,
            VidscribeError::Embedding(_) | VidscribeError::Http(_) => ErrorKind::Embedding,
            VidscribeError::Store(_) | VidscribeError::Database(_) => ErrorKind::Store,
            VidscribeError::OpenAI { stage, .. } => match stage {
                Stage::Extraction => ErrorKind::Extraction,
                Stage::Transcription => ErrorKind::Transcription,
                Stage::Embedding => ErrorKind::Embedding,
            },
            VidscribeError::Timeout { .. } => ErrorKind::Timeout,
            VidscribeError::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Internal,
        }
    }
}

/// Result type alias for vidscribe operations.
pub type Result<T> = std::result::Result<T, VidscribeError>;
