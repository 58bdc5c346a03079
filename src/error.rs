//! Error types for Spor.

use thiserror::Error;

/// Library-level error type for Spor operations.
#[derive(Error, Debug)]
pub enum SporError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No captions available for video {0}")]
    NoCaptions(String),

    #[error("Caption source blocked the request: {0}")]
    Blocked(String),

    #[error("Transient caption source error: {0}")]
    TransientSource(String),

    #[error("Translation failed: {0}")]
    Translation(String),

    #[error("Generation timed out after {0}s")]
    GenerationTimeout(u64),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Cache error: {0}")]
    Cache(String),

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

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SporError {
    /// Whether a retry of the same call could succeed.
    ///
    /// Only collaborator failures (generation, embedding, transient source
    /// errors) qualify. Missing or blocked captions are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SporError::GenerationTimeout(_)
                | SporError::Generation(_)
                | SporError::Embedding(_)
                | SporError::TransientSource(_)
                | SporError::Http(_)
        )
    }

    /// Short machine-readable code, as returned by the HTTP API.
    pub fn code(&self) -> &'static str {
        match self {
            SporError::NoCaptions(_) => "no_captions",
            SporError::Blocked(_) => "blocked",
            SporError::TransientSource(_) => "transient_error",
            SporError::Translation(_) => "translation_failed",
            SporError::GenerationTimeout(_) | SporError::Generation(_) => "generation_failed",
            SporError::InvalidInput(_) => "invalid_input",
            _ => "internal_error",
        }
    }
}

/// Result type alias for Spor operations.
pub type Result<T> = std::result::Result<T, SporError>;
