//! Question answering engine for Spor.
//!
//! Wires the transcript store, chunker, retrievers, generator and caches into
//! the single `answer_question` operation.

use crate::cache::{create_cache_store, CacheStore};
use crate::chunking::{Chunk, ChunkingConfig, WindowChunker};
use crate::clock::{Clock, SystemClock};
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{Result, SporError};
use crate::generation::{LanguageModel, OpenAIChatModel, RetryPolicy};
use crate::rag::{
    AnswerCache, AnswerRequest, ChatAnswer, ChatMessage, HybridCoordinator, InconclusiveDetector,
    PromptBuilder, SourceRef,
};
use crate::retrieval::{LexicalRetriever, RetrievalMethod, RetrievalResult, SemanticRetriever};
use crate::transcript::{
    LanguageOption, Transcript, TranscriptSource, TranscriptStore, Translator, YoutubeCaptionSource,
    ENGLISH,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Shown when generation fails after retry.
pub const UNAVAILABLE_MESSAGE: &str =
    "The assistant is temporarily unavailable. Please try again in a moment.";

/// External collaborators of the engine.
pub struct Components {
    pub source: Arc<dyn TranscriptSource>,
    pub model: Arc<dyn LanguageModel>,
    pub embedder: Arc<dyn Embedder>,
    pub cache: Arc<dyn CacheStore>,
    pub clock: Arc<dyn Clock>,
}

/// Whether an answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStatus {
    Answered,
    /// Generation failed after retry. Never cached.
    Unavailable,
}

/// Result of [`Engine::answer_question`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub status: AnswerStatus,
    pub answer: String,
    /// True when served from the answer cache.
    pub cached: bool,
    pub method: Option<RetrievalMethod>,
    pub escalated: bool,
    pub sources: Vec<SourceRef>,
}

impl QuestionAnswer {
    fn answered(answer: ChatAnswer, cached: bool) -> Self {
        Self {
            status: AnswerStatus::Answered,
            answer: answer.text,
            cached,
            method: Some(answer.method),
            escalated: answer.escalated,
            sources: answer.sources,
        }
    }

    fn unavailable() -> Self {
        Self {
            status: AnswerStatus::Unavailable,
            answer: UNAVAILABLE_MESSAGE.to_string(),
            cached: false,
            method: None,
            escalated: false,
            sources: Vec::new(),
        }
    }
}

/// The main engine.
pub struct Engine {
    settings: Settings,
    cache: Arc<dyn CacheStore>,
    youtube: Option<Arc<YoutubeCaptionSource>>,
    transcripts: TranscriptStore,
    chunker: WindowChunker,
    lexical: Arc<LexicalRetriever>,
    semantic: Arc<SemanticRetriever>,
    coordinator: HybridCoordinator,
    answers: AnswerCache,
}

impl Engine {
    /// Create an engine backed by YouTube captions and OpenAI.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(settings.prompts.custom_file.as_deref())?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cache = create_cache_store(&settings, clock.clone())?;

        let youtube = Arc::new(YoutubeCaptionSource::new(&settings.transcript.ytdlp_path)?);
        let model = Arc::new(OpenAIChatModel::new(
            &settings.generation.model,
            settings.generation.timeout(),
        )?);
        let embedder = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        )?);

        info!(
            "Engine ready (cache: {}, model: {}, embeddings: {})",
            settings.cache.backend, settings.generation.model, settings.embedding.model
        );

        let components = Components {
            source: youtube.clone(),
            model,
            embedder,
            cache,
            clock,
        };
        let mut engine = Self::with_components(settings, prompts, components)?;
        engine.youtube = Some(youtube);
        Ok(engine)
    }

    /// Create an engine with custom components.
    pub fn with_components(settings: Settings, prompts: Prompts, components: Components) -> Result<Self> {
        let Components {
            source,
            model,
            embedder,
            cache,
            clock,
        } = components;
        let retry = RetryPolicy::from_settings(&settings.generation);

        let translator = Translator::new(model.clone(), prompts.translation.clone())?
            .with_retry(retry)
            .with_sampling(
                settings.generation.translation_temperature,
                settings.generation.translation_max_tokens,
            )
            .with_batching(
                settings.transcript.translation_batch_segments,
                settings.transcript.max_concurrent_translations,
            );

        let transcripts = TranscriptStore::new(source, Arc::new(translator), cache.clone(), clock.clone())
            .with_ttls(settings.cache.transcript_ttl(), settings.cache.translation_ttl());

        let lexical = Arc::new(LexicalRetriever::new());
        let semantic = Arc::new(SemanticRetriever::new(embedder, cache.clone()).with_retry(retry));

        let prompt = PromptBuilder::new(&prompts)
            .with_history_messages(settings.retrieval.history_messages)
            .with_sampling(settings.generation.temperature, settings.generation.max_tokens);

        let coordinator = HybridCoordinator::new(
            lexical.clone(),
            semantic.clone(),
            model,
            prompt,
            InconclusiveDetector::new(&prompts.inconclusive),
            clock,
        )
        .with_retry(retry)
        .with_top_k(settings.retrieval.top_k);

        let answers = AnswerCache::new(cache.clone(), settings.cache.answer_ttl());
        let chunker = WindowChunker::new(ChunkingConfig::from(&settings.chunking));

        Ok(Self {
            settings,
            cache,
            youtube: None,
            transcripts,
            chunker,
            lexical,
            semantic,
            coordinator,
            answers,
        })
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get the cache store.
    pub fn cache(&self) -> Arc<dyn CacheStore> {
        self.cache.clone()
    }

    /// Turn a URL or bare ID into a video ID.
    pub fn video_id(&self, input: &str) -> Result<String> {
        let input = input.trim();
        if input.is_empty() {
            return Err(SporError::InvalidInput("Video ID is empty".into()));
        }

        match &self.youtube {
            Some(youtube) => youtube.extract_video_id(input).ok_or_else(|| {
                SporError::InvalidInput(format!("Could not parse video ID from: {}", input))
            }),
            None => Ok(input.to_string()),
        }
    }

    /// Answer a question about a video.
    ///
    /// No captions and blocked sources are returned as errors. Generation,
    /// embedding and translation failures that survive retry become an
    /// [`AnswerStatus::Unavailable`] answer, which is not cached.
    #[instrument(skip(self, question, history))]
    pub async fn answer_question(
        &self,
        video_id: &str,
        question: &str,
        history: &[ChatMessage],
        language: &str,
    ) -> Result<QuestionAnswer> {
        let video_id = video_id.trim();
        let question = question.trim();
        if video_id.is_empty() {
            return Err(SporError::InvalidInput("Video ID is empty".into()));
        }
        if question.is_empty() {
            return Err(SporError::InvalidInput("Question is empty".into()));
        }
        let language = self.language_or_default(language);

        let result = self
            .answers
            .get_or_compute(video_id, question, &language, || {
                self.compute_answer(video_id, question, history, &language)
            })
            .await;

        match result {
            Ok((answer, cached)) => {
                info!(
                    "Answered {} via {} (cached: {}, escalated: {})",
                    video_id, answer.method, cached, answer.escalated
                );
                Ok(QuestionAnswer::answered(answer, cached))
            }
            Err(e) if is_unavailable(&e) => {
                warn!("Answer for {} unavailable: {}", video_id, e);
                Ok(QuestionAnswer::unavailable())
            }
            Err(e) => Err(e),
        }
    }

    async fn compute_answer(
        &self,
        video_id: &str,
        question: &str,
        history: &[ChatMessage],
        language: &str,
    ) -> Result<ChatAnswer> {
        let transcript = self.transcripts.resolve(video_id, &[language.to_string()]).await?;
        let chunks = self.chunks(&transcript)?;

        let outcome = self
            .coordinator
            .answer(AnswerRequest {
                chunks: &chunks,
                question,
                history,
                embedding_ttl: self.transcripts.remaining_lifetime(&transcript),
            })
            .await?;

        Ok(outcome.answer)
    }

    /// Resolve a transcript for the first satisfiable language.
    pub async fn resolve_transcript(&self, video_id: &str, languages: &[String]) -> Result<Transcript> {
        let languages = if languages.is_empty() {
            self.settings.transcript.default_languages.clone()
        } else {
            languages.to_vec()
        };
        self.transcripts.resolve(video_id.trim(), &languages).await
    }

    /// Languages the video can be served in.
    pub async fn available_languages(&self, video_id: &str) -> Result<Vec<LanguageOption>> {
        self.transcripts.available_languages(video_id.trim()).await
    }

    /// Rank a video's chunks for a query with one retriever, without generating.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        video_id: &str,
        query: &str,
        language: &str,
        method: RetrievalMethod,
        top_k: usize,
    ) -> Result<RetrievalResult> {
        let language = self.language_or_default(language);
        let transcript = self.transcripts.resolve(video_id.trim(), &[language]).await?;
        let chunks = self.chunks(&transcript)?;

        match method {
            RetrievalMethod::Lexical => Ok(self.lexical.retrieve(&chunks, query, top_k)),
            RetrievalMethod::Semantic => {
                let ttl = self.transcripts.remaining_lifetime(&transcript);
                self.semantic.retrieve(&chunks, query, top_k, ttl).await
            }
        }
    }

    /// Delete every cached artifact of a video.
    #[instrument(skip(self))]
    pub async fn purge_video(&self, video_id: &str) -> Result<usize> {
        let video_id = video_id.trim();
        if video_id.is_empty() {
            return Err(SporError::InvalidInput("Video ID is empty".into()));
        }

        let mut deleted = 0;
        for prefix in crate::cache::keys::video_prefixes(video_id) {
            deleted += self.cache.delete_prefix(&prefix).await?;
        }
        self.lexical.clear(video_id);

        info!("Purged {} cache entries for {}", deleted, video_id);
        Ok(deleted)
    }

    /// Drop expired cache entries.
    pub async fn purge_expired(&self) -> Result<usize> {
        let purged = self.cache.purge_expired().await?;
        info!("Purged {} expired cache entries", purged);
        Ok(purged)
    }

    fn chunks(&self, transcript: &Transcript) -> Result<Vec<Chunk>> {
        let chunks = self.chunker.chunk(transcript);
        if chunks.is_empty() {
            return Err(SporError::NoCaptions(transcript.video_id().to_string()));
        }
        Ok(chunks)
    }

    fn language_or_default(&self, language: &str) -> String {
        let language = language.trim();
        if !language.is_empty() {
            return language.to_string();
        }
        self.settings
            .transcript
            .default_languages
            .first()
            .cloned()
            .unwrap_or_else(|| ENGLISH.to_string())
    }
}

/// Failures reported to the caller as "temporarily unavailable".
fn is_unavailable(error: &SporError) -> bool {
    error.is_retryable() || matches!(error, SporError::Translation(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::clock::ManualClock;
    use crate::generation::GenerationRequest;
    use crate::testing::{FakeEmbedder, FakeSource, ScriptedModel};
    use crate::transcript::{CaptionTrack, TranscriptSegment};
    use std::time::Duration;

    struct Fixture {
        engine: Engine,
        model: Arc<ScriptedModel>,
        source: Arc<FakeSource>,
        cache: Arc<MemoryCacheStore>,
        clock: Arc<ManualClock>,
    }

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.cache.backend = "memory".to_string();
        settings.generation.retry_backoff_ms = 0;
        settings
    }

    fn fixture(source: FakeSource, model: ScriptedModel) -> Fixture {
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(MemoryCacheStore::new(clock.clone()));
        let source = Arc::new(source);
        let model = Arc::new(model);

        let engine = Engine::with_components(
            settings(),
            Prompts::default(),
            Components {
                source: source.clone(),
                model: model.clone(),
                embedder: Arc::new(FakeEmbedder::with_axes(&["rocket"])),
                cache: cache.clone(),
                clock: clock.clone(),
            },
        )
        .unwrap();

        Fixture {
            engine,
            model,
            source,
            cache,
            clock,
        }
    }

    fn english_video() -> FakeSource {
        FakeSource::new().with_track(
            CaptionTrack::new("en", "English", false),
            vec![
                TranscriptSegment::new(0.0, 4.0, "Welcome to the channel."),
                TranscriptSegment::new(4.0, 6.0, "The rocket launch is on March 15."),
            ],
        )
    }

    fn french_video() -> FakeSource {
        FakeSource::new().with_track(
            CaptionTrack::new("fr", "French", false),
            vec![
                TranscriptSegment::new(0.0, 4.0, "Bienvenue sur la chaîne."),
                TranscriptSegment::new(4.0, 6.0, "Le lancement de la fusée est le 15 mars."),
            ],
        )
    }

    fn is_translation(request: &GenerationRequest) -> bool {
        request.system.contains("translate video captions")
    }

    /// Translates the French fixture and answers everything else.
    fn bilingual_model() -> ScriptedModel {
        ScriptedModel::new(|request| {
            if is_translation(request) {
                Ok("[0] Welcome to the channel.\n[1] The rocket launch is on March 15.".to_string())
            } else {
                Ok("The launch is on March 15.".to_string())
            }
        })
    }

    fn translation_calls(model: &ScriptedModel) -> usize {
        model.requests().iter().filter(|r| is_translation(r)).count()
    }

    #[tokio::test]
    async fn test_repeat_question_is_served_from_cache() {
        let f = fixture(english_video(), ScriptedModel::replying("March 15."));

        let first = f
            .engine
            .answer_question("abc", "When is the launch?", &[], "en")
            .await
            .unwrap();
        assert_eq!(first.status, AnswerStatus::Answered);
        assert!(!first.cached);
        assert_eq!(first.method, Some(RetrievalMethod::Lexical));

        let second = f
            .engine
            .answer_question("abc", "  when is THE launch? ", &[], "en")
            .await
            .unwrap();
        assert!(second.cached);
        assert_eq!(second.answer, first.answer);
        assert_eq!(f.model.calls(), 1);
    }

    #[tokio::test]
    async fn test_cached_answer_expires_after_a_day() {
        let f = fixture(english_video(), ScriptedModel::replying("March 15."));

        f.engine.answer_question("abc", "When?", &[], "en").await.unwrap();
        f.clock.advance(chrono::Duration::hours(24) + chrono::Duration::seconds(1));
        let again = f.engine.answer_question("abc", "When?", &[], "en").await.unwrap();

        assert!(!again.cached);
        assert_eq!(f.model.calls(), 2);
        // the transcript (30 days) is still cached
        assert_eq!(f.source.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_french_video_is_translated_once() {
        let f = fixture(french_video(), bilingual_model());

        let transcript = f.engine.resolve_transcript("fr123", &["en".to_string()]).await.unwrap();
        assert_eq!(transcript.language(), "en");
        assert!(transcript.is_generated());
        assert_eq!(translation_calls(&f.model), 1);
        assert!(f
            .cache
            .get(&crate::cache::keys::translation("fr123", "fr"))
            .await
            .unwrap()
            .is_some());

        let answer = f
            .engine
            .answer_question("fr123", "When is the launch?", &[], "en")
            .await
            .unwrap();
        assert_eq!(answer.status, AnswerStatus::Answered);
        assert_eq!(translation_calls(&f.model), 1);

        let prompts = f.model.requests();
        let chat = prompts.iter().find(|r| !is_translation(r)).unwrap();
        assert!(chat.user.contains("The rocket launch is on March 15."));
        assert!(!chat.user.contains("fusée"));
    }

    #[tokio::test]
    async fn test_double_timeout_is_unavailable_and_not_cached() {
        let f = fixture(english_video(), ScriptedModel::timing_out());

        let answer = f
            .engine
            .answer_question("abc", "When is the launch?", &[], "en")
            .await
            .unwrap();

        assert_eq!(answer.status, AnswerStatus::Unavailable);
        assert_eq!(answer.answer, UNAVAILABLE_MESSAGE);
        assert!(!answer.cached);
        assert_eq!(f.model.calls(), 2);

        let key = f.engine.answers.key("abc", "When is the launch?", "en");
        assert!(f.cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blank_completions_are_unavailable_and_not_cached() {
        let f = fixture(english_video(), ScriptedModel::replying(""));

        for _ in 0..2 {
            let answer = f
                .engine
                .answer_question("abc", "When is the launch?", &[], "en")
                .await
                .unwrap();
            assert_eq!(answer.status, AnswerStatus::Unavailable);
            assert!(!answer.cached);
        }
        assert_eq!(f.model.calls(), 4);

        let key = f.engine.answers.key("abc", "When is the launch?", "en");
        assert!(f.cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dropped_request_writes_no_answer() {
        let f = fixture(
            english_video(),
            ScriptedModel::replying("March 15.").with_delay(Duration::from_secs(5)),
        );

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            f.engine.answer_question("abc", "When is the launch?", &[], "en"),
        )
        .await;
        assert!(result.is_err());

        let key = f.engine.answers.key("abc", "When is the launch?", "en");
        assert!(f.cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_captions_is_an_error() {
        let f = fixture(FakeSource::new(), ScriptedModel::replying("unused"));

        let result = f.engine.answer_question("silent", "Anything?", &[], "en").await;
        assert!(matches!(result, Err(SporError::NoCaptions(_))));
        assert_eq!(f.model.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_question_is_invalid() {
        let f = fixture(english_video(), ScriptedModel::replying("unused"));

        let result = f.engine.answer_question("abc", "   ", &[], "en").await;
        assert!(matches!(result, Err(SporError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_purge_video_forces_recompute() {
        let f = fixture(english_video(), ScriptedModel::replying("March 15."));

        f.engine.answer_question("abc", "When?", &[], "en").await.unwrap();
        let deleted = f.engine.purge_video("abc").await.unwrap();
        // transcript + answer
        assert_eq!(deleted, 2);

        let again = f.engine.answer_question("abc", "When?", &[], "en").await.unwrap();
        assert!(!again.cached);
        assert_eq!(f.source.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn test_search_with_each_method() {
        let f = fixture(english_video(), ScriptedModel::replying("unused"));

        let lexical = f
            .engine
            .search("abc", "rocket", "en", RetrievalMethod::Lexical, 3)
            .await
            .unwrap();
        assert_eq!(lexical.method, RetrievalMethod::Lexical);
        assert_eq!(lexical.chunks.len(), 1);

        let semantic = f
            .engine
            .search("abc", "rocket", "en", RetrievalMethod::Semantic, 3)
            .await
            .unwrap();
        assert_eq!(semantic.method, RetrievalMethod::Semantic);
        assert_eq!(f.model.calls(), 0);
    }

    #[test]
    fn test_video_id_without_youtube_source() {
        let f = fixture(english_video(), ScriptedModel::replying("unused"));
        assert_eq!(f.engine.video_id("  abc ").unwrap(), "abc");
        assert!(f.engine.video_id("").is_err());
    }
}
