//! Configuration module for Spor.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{ChatPrompts, InconclusivePhrases, Prompts, TranslationPrompts};
pub use settings::{
    CacheSettings, ChunkingSettings, EmbeddingSettings, GeneralSettings, GenerationSettings,
    PromptSettings, RetrievalSettings, Settings, TranscriptSettings,
};
