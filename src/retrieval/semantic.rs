//! Embedding similarity ranking.

use super::{rank, RetrievalMethod, RetrievalResult};
use crate::cache::{self, keys, CacheStore};
use crate::chunking::Chunk;
use crate::embedding::Embedder;
use crate::error::{Result, SporError};
use crate::generation::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Ranks chunks by cosine similarity to the query.
///
/// Chunk vectors are cached per `(video_id, chunk_index, model_version,
/// fingerprint)`. Only missing vectors are requested from the provider, in a
/// single batch.
pub struct SemanticRetriever {
    embedder: Arc<dyn Embedder>,
    cache: Arc<dyn CacheStore>,
    retry: RetryPolicy,
}

impl SemanticRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            embedder,
            cache,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Rank `chunks` against `query` and keep the best `top_k`.
    ///
    /// New chunk vectors are cached for `ttl`. A zero `ttl` disables caching.
    #[instrument(skip(self, chunks, query), fields(chunks = chunks.len()))]
    pub async fn retrieve(
        &self,
        chunks: &[Chunk],
        query: &str,
        top_k: usize,
        ttl: Duration,
    ) -> Result<RetrievalResult> {
        if chunks.is_empty() {
            return Ok(rank(chunks, Vec::new(), top_k, RetrievalMethod::Semantic));
        }

        let vectors = self.chunk_vectors(chunks, ttl).await?;
        let query_vector = self
            .retry
            .run("query embedding", || self.embedder.embed(query))
            .await?;

        let scores = vectors
            .iter()
            .map(|v| cosine_similarity(&query_vector, v))
            .collect();

        Ok(rank(chunks, scores, top_k, RetrievalMethod::Semantic))
    }

    async fn chunk_vectors(&self, chunks: &[Chunk], ttl: Duration) -> Result<Vec<Vec<f32>>> {
        let model_version = self.embedder.model_version();
        let keys: Vec<String> = chunks
            .iter()
            .map(|c| keys::embedding(&c.video_id, c.index, model_version, &c.fingerprint))
            .collect();

        let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(chunks.len());
        for key in &keys {
            vectors.push(cache::get_json(self.cache.as_ref(), key).await?);
        }

        let missing: Vec<usize> = (0..chunks.len()).filter(|&i| vectors[i].is_none()).collect();
        debug!(
            "{} of {} chunk embeddings cached",
            chunks.len() - missing.len(),
            chunks.len()
        );

        if !missing.is_empty() {
            let texts: Vec<String> = missing.iter().map(|&i| chunks[i].text.clone()).collect();
            let embedded = self
                .retry
                .run("chunk embeddings", || self.embedder.embed_batch(&texts))
                .await?;

            if embedded.len() != texts.len() {
                return Err(SporError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    texts.len(),
                    embedded.len()
                )));
            }

            info!("Embedded {} chunks", embedded.len());
            for (&i, vector) in missing.iter().zip(embedded) {
                if !ttl.is_zero() {
                    cache::set_json(self.cache.as_ref(), &keys[i], &vector, ttl).await?;
                }
                vectors[i] = Some(vector);
            }
        }

        Ok(vectors.into_iter().flatten().collect())
    }
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
