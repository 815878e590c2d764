//! Configuration settings for vidscribe.

use crate::error::{Result, VidscribeError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub extraction: ExtractionSettings,
    pub transcription: TranscriptionSettings,
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub server: ServerSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Directory for temporary files (extracted audio, split pieces).
    pub temp_dir: String,
    /// Directory where uploaded videos are kept.
    pub uploads_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.vidscribe".to_string(),
            temp_dir: "/tmp/vidscribe".to_string(),
            uploads_dir: "~/.vidscribe/uploads".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Audio extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output channel count.
    pub channels: u32,
    /// Upper bound for one extraction, in seconds.
    pub timeout_seconds: u64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            timeout_seconds: 600,
        }
    }
}

/// Transcription service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Whisper model to use.
    pub model: String,
    /// Optional language hint (ISO-639-1).
    pub language: Option<String>,
    /// Duration in seconds for splitting long audio files.
    pub chunk_duration_seconds: u32,
    /// Maximum concurrent piece transcriptions.
    pub max_concurrent_chunks: usize,
    /// Gaps between segments up to this long are closed.
    pub silence_threshold_seconds: f64,
    /// Upper bound for transcribing one video, in seconds.
    pub timeout_seconds: u64,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: "whisper-1".to_string(),
            language: None,
            chunk_duration_seconds: 600,
            max_concurrent_chunks: 3,
            silence_threshold_seconds: 2.0,
            timeout_seconds: 1800,
        }
    }
}

/// Chunking settings, in characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Size at which a chunk is closed.
    pub target_chars: usize,
    /// Minimum size before a sentence boundary may close a chunk.
    pub min_chars: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            target_chars: 1000,
            min_chars: 200,
        }
    }
}

/// Embedding backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    OpenAI,
    Ollama,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(EmbeddingProvider::OpenAI),
            "ollama" => Ok(EmbeddingProvider::Ollama),
            _ => Err(format!("Unknown embedding provider: {}", s)),
        }
    }
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProvider::OpenAI => write!(f, "openai"),
            EmbeddingProvider::Ollama => write!(f, "ollama"),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai, ollama).
    pub provider: EmbeddingProvider,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions. Every stored vector has exactly this length.
    pub dimensions: u32,
    /// Maximum texts per backend call.
    pub batch_size: usize,
    /// Ollama server URL (for the ollama provider).
    pub ollama_url: String,
    /// Upper bound for embedding one video, in seconds.
    pub timeout_seconds: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAI,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            batch_size: 100,
            ollama_url: "http://localhost:11434".to_string(),
            timeout_seconds: 300,
        }
    }
}

/// Vector store backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreProvider {
    #[default]
    Sqlite,
    Memory,
}

impl std::fmt::Display for VectorStoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorStoreProvider::Sqlite => write!(f, "sqlite"),
            VectorStoreProvider::Memory => write!(f, "memory"),
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (sqlite, memory).
    pub provider: VectorStoreProvider,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: VectorStoreProvider::Sqlite,
            sqlite_path: "~/.vidscribe/vectors.db".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Largest accepted upload, in megabytes.
    pub max_upload_mb: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_upload_mb: 2048,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Settings>(&content)?
        } else {
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.target_chars == 0 {
            return Err(VidscribeError::Config(
                "chunking.target_chars must be greater than zero".to_string(),
            ));
        }
        if self.chunking.min_chars > self.chunking.target_chars {
            return Err(VidscribeError::Config(format!(
                "chunking.min_chars ({}) exceeds chunking.target_chars ({})",
                self.chunking.min_chars, self.chunking.target_chars
            )));
        }
        if self.embedding.dimensions == 0 {
            return Err(VidscribeError::Config(
                "embedding.dimensions must be greater than zero".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(VidscribeError::Config(
                "embedding.batch_size must be greater than zero".to_string(),
            ));
        }
        if self.transcription.max_concurrent_chunks == 0 {
            return Err(VidscribeError::Config(
                "transcription.max_concurrent_chunks must be greater than zero".to_string(),
            ));
        }
        if self.transcription.silence_threshold_seconds < 0.0 {
            return Err(VidscribeError::Config(
                "transcription.silence_threshold_seconds cannot be negative".to_string(),
            ));
        }
        if self.extraction.sample_rate == 0 {
            return Err(VidscribeError::Config(
                "extraction.sample_rate must be greater than zero".to_string(),
            ));
        }
        // Transcription backends expect mono input
        if self.extraction.channels != 1 {
            return Err(VidscribeError::Config(format!(
                "extraction.channels must be 1, got {}",
                self.extraction.channels
            )));
        }
        if self.transcription.model.trim().is_empty() {
            return Err(VidscribeError::Config(
                "transcription.model cannot be empty".to_string(),
            ));
        }
        if self.transcription.chunk_duration_seconds == 0 {
            return Err(VidscribeError::Config(
                "transcription.chunk_duration_seconds must be greater than zero".to_string(),
            ));
        }
        for (key, seconds) in [
            ("extraction.timeout_seconds", self.extraction.timeout_seconds),
            ("transcription.timeout_seconds", self.transcription.timeout_seconds),
            ("embedding.timeout_seconds", self.embedding.timeout_seconds),
        ] {
            if seconds == 0 {
                return Err(VidscribeError::Config(format!(
                    "{} must be greater than zero",
                    key
                )));
            }
        }
        if self.embedding.provider == EmbeddingProvider::Ollama {
            url::Url::parse(&self.embedding.ollama_url).map_err(|e| {
                VidscribeError::Config(format!(
                    "embedding.ollama_url '{}' is not a valid URL: {}",
                    self.embedding.ollama_url, e
                ))
            })?;
        }
        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| VidscribeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidscribe")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the expanded uploads directory path.
    pub fn uploads_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.uploads_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction.timeout_seconds)
    }

    pub fn transcription_timeout(&self) -> Duration {
        Duration::from_secs(self.transcription.timeout_seconds)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding.timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.extraction.sample_rate, 16_000);
        assert_eq!(settings.extraction.channels, 1);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [embedding]
            provider = "ollama"
            model = "nomic-embed-text"
            dimensions = 768

            [chunking]
            target_chars = 500
            "#,
        )
        .unwrap();

        assert_eq!(settings.embedding.provider, EmbeddingProvider::Ollama);
        assert_eq!(settings.embedding.dimensions, 768);
        assert_eq!(settings.embedding.batch_size, 100);
        assert_eq!(settings.chunking.target_chars, 500);
        assert_eq!(settings.chunking.min_chars, 200);
        assert_eq!(settings.vector_store.provider, VectorStoreProvider::Sqlite);
    }

    #[test]
    fn test_validate_rejects_min_above_target() {
        let mut settings = Settings::default();
        settings.chunking.min_chars = 2000;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, VidscribeError::Config(_)));
    }

    #[test]
    fn test_validate_requires_mono_extraction() {
        let mut settings = Settings::default();
        settings.extraction.channels = 2;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("extraction.channels"));
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let cases: [fn(&mut Settings); 3] = [
            |s| s.extraction.timeout_seconds = 0,
            |s| s.transcription.timeout_seconds = 0,
            |s| s.embedding.timeout_seconds = 0,
        ];

        for zero_out in cases {
            let mut settings = Settings::default();
            zero_out(&mut settings);
            let err = settings.validate().unwrap_err();
            assert!(err.to_string().contains("timeout_seconds"));
        }
    }

    #[test]
    fn test_validate_rejects_empty_model() {
        let mut settings = Settings::default();
        settings.transcription.model = "  ".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_ollama_url() {
        let mut settings = Settings::default();
        settings.embedding.provider = EmbeddingProvider::Ollama;
        settings.embedding.ollama_url = "not a url".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.server.port = 8088;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.server.port, 8088);
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("OpenAI".parse::<EmbeddingProvider>().unwrap(), EmbeddingProvider::OpenAI);
        assert_eq!("ollama".parse::<EmbeddingProvider>().unwrap(), EmbeddingProvider::Ollama);
        assert!("cohere".parse::<EmbeddingProvider>().is_err());
    }
}
