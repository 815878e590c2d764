//! OpenAI client configuration.

use crate::error::{Result, VidscribeError};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for a single OpenAI API request (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create an OpenAI client with the default request timeout.
pub fn create_client() -> Result<Client<OpenAIConfig>> {
    create_client_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create an OpenAI client with a custom request timeout.
///
/// The API key is read from `OPENAI_API_KEY` by `async-openai`.
pub fn create_client_with_timeout(timeout: Duration) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| VidscribeError::Config(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Client::with_config(OpenAIConfig::default()).with_http_client(http_client))
}

/// Whether an OpenAI API key is present in the environment.
pub fn is_api_key_configured() -> bool {
    std::env::var("OPENAI_API_KEY")
        .map(|k| !k.trim().is_empty())
        .unwrap_or(false)
}
