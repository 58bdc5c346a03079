//! Spor - Question answering over video transcripts
//!
//! Answers questions about what is said in a YouTube video, grounded in the
//! video's captions.
//!
//! # Overview
//!
//! Spor:
//! - Fetches captions, translating them to English when the video has no English track
//! - Splits transcripts into overlapping word windows
//! - Ranks windows with BM25 first and escalates to embeddings when the answer is inconclusive
//! - Caches transcripts, translations, embeddings and answers with per-kind lifetimes
//!
//! # Architecture
//!
//! - `config` - Configuration and prompt templates
//! - `transcript` - Caption sources, translation and the transcript store
//! - `chunking` - Fixed-window chunking
//! - `retrieval` - Lexical (BM25) and semantic retrievers
//! - `embedding` - Embedding generation
//! - `generation` - Language model calls and retry
//! - `rag` - Prompting, inconclusive detection, the hybrid coordinator and answer cache
//! - `cache` - TTL-aware artifact cache
//! - `engine` - Wires everything into `answer_question`
//!
//! # Example
//!
//! ```rust,no_run
//! use spor::config::Settings;
//! use spor::engine::Engine;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let engine = Engine::new(settings)?;
//!
//!     let answer = engine
//!         .answer_question("dQw4w9WgXcQ", "What is the song about?", &[], "en")
//!         .await?;
//!     println!("{}", answer.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod chunking;
pub mod cli;
pub mod clock;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod generation;
pub mod openai;
pub mod rag;
pub mod retrieval;
pub mod transcript;

#[cfg(test)]
mod testing;

pub use error::{Result, SporError};
