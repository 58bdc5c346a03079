//! Memoization of final answers.

use super::ChatAnswer;
use crate::cache::{self, keys, CacheStore};
use crate::error::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Answer cache keyed by `(video_id, normalized question, language)`.
///
/// Hits do not extend the entry's lifetime. Only answers returned by a
/// successful computation are stored, after the computation completes.
pub struct AnswerCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl AnswerCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Return the cached answer, or compute and cache a new one.
    ///
    /// The flag is true when the answer came from the cache.
    #[instrument(skip(self, question, compute))]
    pub async fn get_or_compute<F, Fut>(
        &self,
        video_id: &str,
        question: &str,
        language: &str,
        compute: F,
    ) -> Result<(ChatAnswer, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ChatAnswer>>,
    {
        let key = self.key(video_id, question, language);

        if let Some(answer) = cache::get_json::<ChatAnswer>(self.store.as_ref(), &key).await? {
            debug!("Answer cache hit: {}", key);
            return Ok((answer, true));
        }

        let answer = compute().await?;
        cache::set_json(self.store.as_ref(), &key, &answer, self.ttl).await?;
        debug!("Answer cached: {}", key);

        Ok((answer, false))
    }

    /// Cache key for a question.
    pub fn key(&self, video_id: &str, question: &str, language: &str) -> String {
        keys::answer(video_id, &question_hash(question), language)
    }
}

/// Trim, lowercase and collapse whitespace.
pub fn normalize_question(question: &str) -> String {
    question
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Short hash of the normalized question (16 hex chars).
pub fn question_hash(question: &str) -> String {
    let hash = blake3::hash(normalize_question(question).as_bytes()).to_hex();
    hash.as_str()[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::clock::{Clock, ManualClock};
    use crate::error::SporError;
    use crate::retrieval::RetrievalMethod;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn answer(text: &str, clock: &ManualClock) -> ChatAnswer {
        ChatAnswer {
            text: text.to_string(),
            method: RetrievalMethod::Lexical,
            escalated: false,
            sources: Vec::new(),
            created_at: clock.now(),
        }
    }

    fn setup() -> (AnswerCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryCacheStore::new(clock.clone()));
        (AnswerCache::new(store, Duration::from_secs(24 * 3600)), clock)
    }

    #[test]
    fn test_normalize_question() {
        assert_eq!(normalize_question("  When IS\tthe   launch? "), "when is the launch?");
        assert_eq!(question_hash("When is the launch?"), question_hash(" when is  THE launch? "));
        assert_ne!(question_hash("when is the launch?"), question_hash("when is the launch"));
    }

    #[tokio::test]
    async fn test_second_request_is_served_from_cache() {
        let (cache, clock) = setup();
        let computed = AtomicUsize::new(0);

        let compute = || async {
            computed.fetch_add(1, Ordering::SeqCst);
            Ok(answer("March 15", &clock))
        };

        let (first, cached) = cache.get_or_compute("vid", "When?", "en", compute).await.unwrap();
        assert!(!cached);

        let compute = || async {
            computed.fetch_add(1, Ordering::SeqCst);
            Ok(answer("different", &clock))
        };
        let (second, cached) = cache.get_or_compute("vid", "  when? ", "en", compute).await.unwrap();

        assert!(cached);
        assert_eq!(second, first);
        assert_eq!(computed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_language_is_part_of_the_key() {
        let (cache, clock) = setup();

        cache
            .get_or_compute("vid", "q", "en", || async { Ok(answer("en", &clock)) })
            .await
            .unwrap();
        let (fr, cached) = cache
            .get_or_compute("vid", "q", "fr", || async { Ok(answer("fr", &clock)) })
            .await
            .unwrap();

        assert!(!cached);
        assert_eq!(fr.text, "fr");
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let (cache, clock) = setup();

        let result = cache
            .get_or_compute("vid", "q", "en", || async {
                Err(SporError::GenerationTimeout(30))
            })
            .await;
        assert!(result.is_err());

        let (_, cached) = cache
            .get_or_compute("vid", "q", "en", || async { Ok(answer("ok", &clock)) })
            .await
            .unwrap();
        assert!(!cached);
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl_without_refresh() {
        let (cache, clock) = setup();
        let compute = || async { Ok(answer("a", &clock)) };

        cache.get_or_compute("vid", "q", "en", compute).await.unwrap();

        clock.advance(chrono::Duration::hours(23));
        let (_, cached) = cache
            .get_or_compute("vid", "q", "en", || async { Ok(answer("b", &clock)) })
            .await
            .unwrap();
        assert!(cached);

        // The hit at 23h did not push expiry out
        clock.advance(chrono::Duration::hours(2));
        let (fresh, cached) = cache
            .get_or_compute("vid", "q", "en", || async { Ok(answer("c", &clock)) })
            .await
            .unwrap();
        assert!(!cached);
        assert_eq!(fresh.text, "c");
    }
}
