//! Cache key schemes.
//!
//! Native transcripts and AI translations live under different prefixes, so a
//! translation can never be read back as a native track or vice versa.

const TRANSCRIPT_PREFIX: &str = "transcript";
const TRANSLATION_PREFIX: &str = "transcript_translation";
const ANSWER_PREFIX: &str = "chat_message";
const EMBEDDING_PREFIX: &str = "embedding";

/// Native transcript, keyed by `(video_id, language)`.
pub fn transcript(video_id: &str, language: &str) -> String {
    format!("{}:{}:{}", TRANSCRIPT_PREFIX, video_id, language)
}

/// AI translation to English, keyed by `(video_id, source_language)`.
pub fn translation(video_id: &str, source_language: &str) -> String {
    format!("{}:{}:{}", TRANSLATION_PREFIX, video_id, source_language)
}

/// Generated answer, keyed by `(video_id, question_hash, language)`.
pub fn answer(video_id: &str, question_hash: &str, language: &str) -> String {
    format!("{}:{}:{}:{}", ANSWER_PREFIX, video_id, question_hash, language)
}

/// Chunk embedding. The fingerprint separates chunks of the same index that
/// come from different transcripts of one video (e.g. native vs translated).
pub fn embedding(video_id: &str, chunk_index: usize, model_version: &str, fingerprint: &str) -> String {
    format!(
        "{}:{}:{}:{}:{}",
        EMBEDDING_PREFIX, video_id, chunk_index, model_version, fingerprint
    )
}

/// Every prefix that holds artifacts for a video.
pub fn video_prefixes(video_id: &str) -> Vec<String> {
    [TRANSCRIPT_PREFIX, TRANSLATION_PREFIX, ANSWER_PREFIX, EMBEDDING_PREFIX]
        .iter()
        .map(|prefix| format!("{}:{}:", prefix, video_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_and_translation_keys_differ() {
        assert_ne!(transcript("fr123", "fr"), translation("fr123", "fr"));
        assert_eq!(translation("fr123", "fr"), "transcript_translation:fr123:fr");
    }

    #[test]
    fn test_video_prefixes_do_not_cross_namespaces() {
        let prefixes = video_prefixes("abc");
        // "transcript:abc:" must not match "transcript_translation:abc:..."
        assert!(!translation("abc", "fr").starts_with(&prefixes[0]));
        assert!(translation("abc", "fr").starts_with(&prefixes[1]));
        assert!(embedding("abc", 3, "m1", "ff").starts_with(&prefixes[3]));
    }
}
