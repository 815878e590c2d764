//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available
//! before starting operations that would otherwise fail midway.

use crate::config::{EmbeddingProvider, Settings};
use crate::error::{Result, VidscribeError};
use crate::openai::is_api_key_configured;
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Transcription needs ffmpeg and the OpenAI API.
    Transcribe,
    /// Search embeds the query.
    Search,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Transcribe => {
            check_api_key()?;
            check_tool("ffmpeg")?;
            check_tool("ffprobe")?;
        }
        Operation::Search => {
            if settings.embedding.provider == EmbeddingProvider::OpenAI {
                check_api_key()?;
            }
        }
    }
    Ok(())
}

/// Check if OpenAI API key is configured.
fn check_api_key() -> Result<()> {
    if is_api_key_configured() {
        Ok(())
    } else {
        Err(VidscribeError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        ))
    }
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("-version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(VidscribeError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(VidscribeError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(VidscribeError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
