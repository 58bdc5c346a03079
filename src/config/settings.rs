//! Configuration settings for Spor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub cache: CacheSettings,
    pub transcript: TranscriptSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.spor".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Artifact cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache backend (sqlite, memory).
    pub backend: String,
    /// Path to SQLite database (for sqlite backend).
    pub sqlite_path: String,
    /// Lifetime of native transcripts in seconds.
    pub transcript_ttl_seconds: u64,
    /// Lifetime of AI translations in seconds.
    pub translation_ttl_seconds: u64,
    /// Lifetime of generated answers in seconds.
    pub answer_ttl_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            sqlite_path: "~/.spor/cache.db".to_string(),
            transcript_ttl_seconds: 30 * 24 * 3600,
            translation_ttl_seconds: 7 * 24 * 3600,
            answer_ttl_seconds: 24 * 3600,
        }
    }
}

impl CacheSettings {
    pub fn transcript_ttl(&self) -> Duration {
        Duration::from_secs(self.transcript_ttl_seconds)
    }

    pub fn translation_ttl(&self) -> Duration {
        Duration::from_secs(self.translation_ttl_seconds)
    }

    pub fn answer_ttl(&self) -> Duration {
        Duration::from_secs(self.answer_ttl_seconds)
    }
}

/// Transcript source and translation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptSettings {
    /// Languages requested when none is given.
    pub default_languages: Vec<String>,
    /// Path or name of the yt-dlp binary.
    pub ytdlp_path: String,
    /// Segments sent per translation request.
    pub translation_batch_segments: usize,
    /// Maximum concurrent translation requests.
    pub max_concurrent_translations: usize,
}

impl Default for TranscriptSettings {
    fn default() -> Self {
        Self {
            default_languages: vec!["en".to_string()],
            ytdlp_path: "yt-dlp".to_string(),
            translation_batch_segments: 120,
            max_concurrent_translations: 2,
        }
    }
}

/// Transcript chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Target window size in words.
    pub window_words: usize,
    /// Fraction of each window shared with the next one (0.0-0.9).
    pub overlap_ratio: f32,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            window_words: 160,
            overlap_ratio: 0.2,
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Chunks passed to the model per attempt.
    pub top_k: usize,
    /// Messages of chat history included in the prompt.
    pub history_messages: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            history_messages: 6,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// LLM generation settings (answers and translation).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// LLM model for answers and translation.
    pub model: String,
    /// Sampling temperature for answers.
    pub temperature: f32,
    /// Sampling temperature for translation.
    pub translation_temperature: f32,
    /// Maximum tokens in an answer.
    pub max_tokens: u32,
    /// Maximum tokens in a translation batch.
    pub translation_max_tokens: u32,
    /// Per-call timeout in seconds.
    pub timeout_seconds: u64,
    /// Total attempts per generation call (first call included).
    pub max_attempts: u32,
    /// Delay before a retry, in milliseconds.
    pub retry_backoff_ms: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            translation_temperature: 0.3,
            max_tokens: 500,
            translation_max_tokens: 4096,
            timeout_seconds: 30,
            max_attempts: 2,
            retry_backoff_ms: 1000,
        }
    }
}

impl GenerationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// TOML file overriding the built-in prompts.
    pub custom_file: Option<String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            settings.validate()?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::SporError;

        if self.chunking.window_words == 0 {
            return Err(SporError::Config("chunking.window_words must be > 0".into()));
        }
        if !(0.0..0.9).contains(&self.chunking.overlap_ratio) {
            return Err(SporError::Config(
                "chunking.overlap_ratio must be in [0.0, 0.9)".into(),
            ));
        }
        if !LOG_LEVELS.contains(&self.general.log_level.to_lowercase().as_str()) {
            return Err(SporError::Config(format!(
                "general.log_level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(SporError::Config("retrieval.top_k must be > 0".into()));
        }
        if self.generation.max_attempts == 0 {
            return Err(SporError::Config("generation.max_attempts must be > 0".into()));
        }
        if self.transcript.translation_batch_segments == 0 {
            return Err(SporError::Config(
                "transcript.translation_batch_segments must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SporError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spor")
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

    /// Get the expanded SQLite cache path.
    pub fn cache_path(&self) -> PathBuf {
        Self::expand_path(&self.cache.sqlite_path)
    }
}
