//! Transcript chunking for retrieval.
//!
//! Splits a transcript into fixed-size word windows with overlap, so a passage
//! that straddles one window boundary is whole in the next window.

mod window;

pub use window::WindowChunker;

use crate::config::ChunkingSettings;
use crate::transcript::format_timestamp;
use serde::{Deserialize, Serialize};

/// A window of transcript text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub video_id: String,
    /// Position of this chunk in the video.
    pub index: usize,
    /// Start time in seconds.
    pub start_time: f64,
    /// End time in seconds.
    pub end_time: f64,
    pub text: String,
    /// Number of words in `text`.
    pub token_count: usize,
    /// Hash of `text`.
    pub fingerprint: String,
}

impl Chunk {
    pub fn new(video_id: &str, index: usize, start_time: f64, end_time: f64, text: String) -> Self {
        Self {
            video_id: video_id.to_string(),
            index,
            start_time,
            end_time,
            token_count: text.split_whitespace().count(),
            fingerprint: fingerprint(&text),
            text,
        }
    }

    /// Start time formatted for display.
    pub fn format_timestamp(&self) -> String {
        format_timestamp(self.start_time)
    }
}

/// Configuration for chunking.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Words per window.
    pub window_words: usize,
    /// Fraction of a window shared with the next one.
    pub overlap_ratio: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_words: 160,
            overlap_ratio: 0.2,
        }
    }
}

impl From<&ChunkingSettings> for ChunkingConfig {
    fn from(settings: &ChunkingSettings) -> Self {
        Self {
            window_words: settings.window_words,
            overlap_ratio: settings.overlap_ratio,
        }
    }
}

/// Short content hash (16 hex chars).
pub fn fingerprint(text: &str) -> String {
    let hash = blake3::hash(text.as_bytes()).to_hex();
    hash.as_str()[..16].to_string()
}

/// Hash identifying an exact sequence of chunks.
pub fn chunk_set_fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = blake3::Hasher::new();
    for chunk in chunks {
        hasher.update(chunk.fingerprint.as_bytes());
        hasher.update(b"\n");
    }
    let hash = hasher.finalize().to_hex();
    hash.as_str()[..16].to_string()
}
