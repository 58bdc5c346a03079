//! Question answering over retrieved transcript chunks.
//!
//! The [`HybridCoordinator`] answers from BM25 context first and escalates to
//! embedding retrieval when the answer says the topic was not found. Final
//! answers are memoized by the [`AnswerCache`].

mod answer_cache;
mod coordinator;
mod inconclusive;
mod prompt;

pub use answer_cache::{normalize_question, question_hash, AnswerCache};
pub use coordinator::{AnswerOutcome, AnswerRequest, HybridCoordinator};
pub use inconclusive::InconclusiveDetector;
pub use prompt::PromptBuilder;

use crate::chunking::Chunk;
use crate::retrieval::RetrievalMethod;
use crate::transcript::format_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who said a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A previous turn of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A chunk an answer was generated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub chunk_index: usize,
    /// Formatted start time (e.g., "02:34").
    pub timestamp: String,
    pub start_time: f64,
    pub end_time: f64,
    pub score: f32,
}

impl SourceRef {
    pub fn new(chunk: &Chunk, score: f32) -> Self {
        Self {
            chunk_index: chunk.index,
            timestamp: format_timestamp(chunk.start_time),
            start_time: chunk.start_time,
            end_time: chunk.end_time,
            score,
        }
    }
}

/// A successfully generated answer, as stored in the answer cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub text: String,
    /// Retrieval method behind the final answer.
    pub method: RetrievalMethod,
    /// Whether the semantic fallback ran.
    pub escalated: bool,
    pub sources: Vec<SourceRef>,
    pub created_at: DateTime<Utc>,
}
