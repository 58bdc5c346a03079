//! Chunk retrieval for question answering.
//!
//! Two rankers over the chunks of one video: BM25 ([`LexicalRetriever`]) runs
//! first, embeddings ([`SemanticRetriever`]) are the fallback when the lexical
//! context does not produce an answer.

mod lexical;
mod semantic;
mod tokenize;

pub use lexical::{Bm25Index, LexicalRetriever};
pub use semantic::{cosine_similarity, SemanticRetriever};
pub use tokenize::tokenize;

use crate::chunking::Chunk;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How chunks were ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMethod {
    Lexical,
    Semantic,
}

impl std::fmt::Display for RetrievalMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetrievalMethod::Lexical => write!(f, "lexical"),
            RetrievalMethod::Semantic => write!(f, "semantic"),
        }
    }
}

/// Ranked chunks, best first. `scores[i]` belongs to `chunks[i]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunks: Vec<Chunk>,
    pub scores: Vec<f32>,
    pub method: RetrievalMethod,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Sort by score (descending), then earliest start time, and keep `top_k`.
fn rank(chunks: &[Chunk], scores: Vec<f32>, top_k: usize, method: RetrievalMethod) -> RetrievalResult {
    let mut ranked: Vec<(&Chunk, f32)> = chunks.iter().zip(scores).collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.start_time.partial_cmp(&b.0.start_time).unwrap_or(Ordering::Equal))
            .then_with(|| a.0.index.cmp(&b.0.index))
    });
    ranked.truncate(top_k);

    let (chunks, scores) = ranked.into_iter().map(|(c, s)| (c.clone(), s)).unzip();
    RetrievalResult {
        chunks,
        scores,
        method,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_breaks_ties_by_start_time() {
        let chunks = vec![
            Chunk::new("v", 0, 0.0, 10.0, "a".into()),
            Chunk::new("v", 1, 10.0, 20.0, "b".into()),
            Chunk::new("v", 2, 20.0, 30.0, "c".into()),
        ];
        let result = rank(&chunks, vec![0.5, 0.9, 0.5], 2, RetrievalMethod::Lexical);

        assert_eq!(result.chunks[0].index, 1);
        assert_eq!(result.chunks[1].index, 0);
        assert_eq!(result.scores, vec![0.9, 0.5]);
    }

    #[test]
    fn test_method_serializes_lowercase() {
        let json = serde_json::to_string(&RetrievalMethod::Semantic).unwrap();
        assert_eq!(json, "\"semantic\"");
        assert_eq!(RetrievalMethod::Lexical.to_string(), "lexical");
    }
}
