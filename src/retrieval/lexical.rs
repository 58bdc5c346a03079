//! BM25 keyword ranking.

use super::{rank, tokenize, RetrievalMethod, RetrievalResult};
use crate::chunking::{chunk_set_fingerprint, Chunk};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, instrument};

const K1: f64 = 1.5;
const B: f64 = 0.75;

/// Inverted index over the chunks of one transcript.
#[derive(Debug)]
pub struct Bm25Index {
    /// term -> (chunk position, term frequency)
    postings: HashMap<String, Vec<(usize, u32)>>,
    doc_lengths: Vec<usize>,
    avg_doc_length: f64,
}

impl Bm25Index {
    pub fn build(chunks: &[Chunk]) -> Self {
        let mut postings: HashMap<String, Vec<(usize, u32)>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(chunks.len());

        for (position, chunk) in chunks.iter().enumerate() {
            let tokens = tokenize(&chunk.text);
            doc_lengths.push(tokens.len());

            let mut term_freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *term_freqs.entry(token).or_insert(0) += 1;
            }
            for (term, freq) in term_freqs {
                postings.entry(term).or_default().push((position, freq));
            }
        }

        let total: usize = doc_lengths.iter().sum();
        let avg_doc_length = if doc_lengths.is_empty() {
            0.0
        } else {
            total as f64 / doc_lengths.len() as f64
        };

        Self {
            postings,
            doc_lengths,
            avg_doc_length,
        }
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }

    /// BM25 score of every chunk, by position.
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let mut scores = vec![0.0; self.len()];
        if self.is_empty() || self.avg_doc_length == 0.0 {
            return scores;
        }

        let doc_count = self.len() as f64;
        for token in tokenize(query) {
            let Some(postings) = self.postings.get(&token) else {
                continue;
            };

            let n = postings.len() as f64;
            // Always positive, even for terms in every chunk
            let idf = ((doc_count - n + 0.5) / (n + 0.5) + 1.0).ln();

            for &(position, tf) in postings {
                let tf = tf as f64;
                let doc_len = self.doc_lengths[position] as f64;
                let norm = K1 * (1.0 - B + B * doc_len / self.avg_doc_length);
                scores[position] += idf * (tf * (K1 + 1.0)) / (tf + norm);
            }
        }

        scores
    }
}

/// BM25 retriever with per-video index memoization.
///
/// One index is kept per video. It is rebuilt when the chunk set changes,
/// e.g. when a video is served in another language.
#[derive(Default)]
pub struct LexicalRetriever {
    indexes: RwLock<HashMap<String, (String, Arc<Bm25Index>)>>,
}

impl LexicalRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rank `chunks` against `query` and keep the best `top_k`.
    #[instrument(skip(self, chunks, query), fields(chunks = chunks.len()))]
    pub fn retrieve(&self, chunks: &[Chunk], query: &str, top_k: usize) -> RetrievalResult {
        let index = self.index_for(chunks);
        let scores = index.scores(query).into_iter().map(|s| s as f32).collect();
        rank(chunks, scores, top_k, RetrievalMethod::Lexical)
    }

    /// Drop the memoized index of a video. Returns whether one existed.
    pub fn clear(&self, video_id: &str) -> bool {
        match self.indexes.write() {
            Ok(mut indexes) => indexes.remove(video_id).is_some(),
            Err(_) => false,
        }
    }

    fn index_for(&self, chunks: &[Chunk]) -> Arc<Bm25Index> {
        let Some(video_id) = chunks.first().map(|c| c.video_id.clone()) else {
            return Arc::new(Bm25Index::build(chunks));
        };
        let fingerprint = chunk_set_fingerprint(chunks);

        if let Ok(indexes) = self.indexes.read() {
            if let Some((cached, index)) = indexes.get(&video_id) {
                if *cached == fingerprint {
                    debug!("Reusing BM25 index for {}", video_id);
                    return index.clone();
                }
            }
        }

        debug!("Building BM25 index for {} ({} chunks)", video_id, chunks.len());
        let index = Arc::new(Bm25Index::build(chunks));
        if let Ok(mut indexes) = self.indexes.write() {
            indexes.insert(video_id, (fingerprint, index.clone()));
        }
        index
    }

    #[cfg(test)]
    fn is_memoized(&self, video_id: &str) -> bool {
        self.indexes
            .read()
            .map(|i| i.contains_key(video_id))
            .unwrap_or(false)
    }
}
