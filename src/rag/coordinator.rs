//! Lexical-first retrieval with semantic escalation.

use super::{ChatAnswer, ChatMessage, InconclusiveDetector, PromptBuilder, SourceRef};
use crate::chunking::Chunk;
use crate::clock::Clock;
use crate::error::{Result, SporError};
use crate::generation::{LanguageModel, RetryPolicy};
use crate::retrieval::{LexicalRetriever, RetrievalMethod, RetrievalResult, SemanticRetriever};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Input for one answer.
#[derive(Debug, Clone, Copy)]
pub struct AnswerRequest<'a> {
    pub chunks: &'a [Chunk],
    pub question: &'a str,
    pub history: &'a [ChatMessage],
    /// How long new chunk embeddings may be cached.
    pub embedding_ttl: Duration,
}

/// Result of the hybrid pipeline.
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub answer: ChatAnswer,
    /// Whether the final answer still says the topic was not found.
    pub inconclusive: bool,
}

/// Answers from BM25 context, falling back to embedding retrieval when the
/// generated answer is inconclusive.
///
/// The fallback answer is returned as is, even if it is inconclusive too.
pub struct HybridCoordinator {
    lexical: Arc<LexicalRetriever>,
    semantic: Arc<SemanticRetriever>,
    model: Arc<dyn LanguageModel>,
    prompt: PromptBuilder,
    detector: InconclusiveDetector,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    top_k: usize,
}

impl HybridCoordinator {
    pub fn new(
        lexical: Arc<LexicalRetriever>,
        semantic: Arc<SemanticRetriever>,
        model: Arc<dyn LanguageModel>,
        prompt: PromptBuilder,
        detector: InconclusiveDetector,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            lexical,
            semantic,
            model,
            prompt,
            detector,
            clock,
            retry: RetryPolicy::default(),
            top_k: 3,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Run the pipeline for one question.
    ///
    /// Generation failures (after retry) and embedding failures are returned
    /// as errors; nothing is cached here.
    #[instrument(skip(self, request), fields(chunks = request.chunks.len()))]
    pub async fn answer(&self, request: AnswerRequest<'_>) -> Result<AnswerOutcome> {
        let lexical = self.lexical.retrieve(request.chunks, request.question, self.top_k);
        let answer = self.generate(&lexical, &request).await?;

        if !self.detector.is_inconclusive(&answer) {
            debug!("Lexical answer accepted");
            return Ok(self.outcome(answer, &lexical, false, false));
        }

        info!("Lexical answer inconclusive, escalating to semantic retrieval");
        let semantic = self
            .semantic
            .retrieve(request.chunks, request.question, self.top_k, request.embedding_ttl)
            .await?;
        let answer = self.generate(&semantic, &request).await?;
        let inconclusive = self.detector.is_inconclusive(&answer);

        Ok(self.outcome(answer, &semantic, true, inconclusive))
    }

    async fn generate(&self, retrieved: &RetrievalResult, request: &AnswerRequest<'_>) -> Result<String> {
        let prompt = self.prompt.build(retrieved, request.question, request.history);
        let label = format!("{} answer", retrieved.method);
        self.retry
            .run(&label, || async {
                let text = self.model.generate(&prompt).await?;
                if text.trim().is_empty() {
                    return Err(SporError::Generation("Model returned an empty answer".into()));
                }
                Ok(text)
            })
            .await
    }

    fn outcome(
        &self,
        text: String,
        retrieved: &RetrievalResult,
        escalated: bool,
        inconclusive: bool,
    ) -> AnswerOutcome {
        let sources = retrieved
            .chunks
            .iter()
            .zip(&retrieved.scores)
            .map(|(chunk, score)| SourceRef::new(chunk, *score))
            .collect();

        AnswerOutcome {
            answer: ChatAnswer {
                text,
                method: retrieved.method,
                escalated,
                sources,
                created_at: self.clock.now(),
            },
            inconclusive,
        }
    }
}
