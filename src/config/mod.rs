//! Configuration module for vidscribe.
//!
//! Handles loading and validating application settings.

mod settings;

pub use settings::{
    ChunkingSettings, EmbeddingProvider, EmbeddingSettings, ExtractionSettings, GeneralSettings,
    ServerSettings, Settings, TranscriptionSettings, VectorStoreProvider, VectorStoreSettings,
};
