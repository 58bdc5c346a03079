//! Data models for transcripts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Language code used for AI translations.
pub const ENGLISH: &str = "en";

/// A single caption segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds.
    pub start: f64,
    /// Duration in seconds.
    pub duration: f64,
    /// Caption text.
    pub text: String,
}

impl TranscriptSegment {
    /// Create a new transcript segment.
    pub fn new(start: f64, duration: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            duration,
            text: text.into(),
        }
    }

    /// End time in seconds.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Number of whitespace-separated words.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// A caption track a video offers in its original form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionTrack {
    /// Language code (e.g. "fr", "en-GB").
    pub language: String,
    /// Human-readable language name.
    pub name: String,
    /// Whether the platform generated the captions by speech recognition.
    pub is_auto: bool,
}

impl CaptionTrack {
    pub fn new(language: impl Into<String>, name: impl Into<String>, is_auto: bool) -> Self {
        Self {
            language: language.into(),
            name: name.into(),
            is_auto,
        }
    }
}

/// A language the caller can ask for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageOption {
    pub code: String,
    pub name: String,
    /// True for the AI-translated English option.
    pub is_translation: bool,
}

/// A complete transcript in one language.
///
/// Immutable: fields are only set by [`Transcript::native`] and
/// [`Transcript::translated`]. The `en` + `is_generated` combination can only
/// come out of the translation constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    video_id: String,
    language: String,
    is_generated: bool,
    segments: Vec<TranscriptSegment>,
    fetched_at: DateTime<Utc>,
}

impl Transcript {
    /// A transcript as published on the video, labelled with its track's language.
    pub fn native(
        video_id: impl Into<String>,
        track: &CaptionTrack,
        segments: Vec<TranscriptSegment>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            language: track.language.clone(),
            is_generated: false,
            segments,
            fetched_at,
        }
    }

    /// An AI translation of `source` into English.
    pub fn translated(
        source: &Transcript,
        segments: Vec<TranscriptSegment>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            video_id: source.video_id.clone(),
            language: ENGLISH.to_string(),
            is_generated: true,
            segments,
            fetched_at,
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// True for AI translations, false for native tracks.
    pub fn is_generated(&self) -> bool {
        self.is_generated
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Full transcript text (concatenated segments).
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Total duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.segments.last().map(|s| s.end()).unwrap_or(0.0)
    }

    /// Format the transcript with timestamps for display.
    pub fn format_with_timestamps(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("[{}] {}", format_timestamp(s.start), s.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Primary subtag of a language code ("en-GB" -> "en").
pub fn primary_language(code: &str) -> String {
    code.split(['-', '_'])
        .next()
        .unwrap_or(code)
        .to_lowercase()
}

/// Whether a language code denotes English.
pub fn is_english(code: &str) -> bool {
    primary_language(code) == ENGLISH
}

/// Format seconds as MM:SS or HH:MM:SS.
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn french() -> Transcript {
        Transcript::native(
            "fr123",
            &CaptionTrack::new("fr", "French", false),
            vec![
                TranscriptSegment::new(0.0, 2.5, "Bonjour à tous"),
                TranscriptSegment::new(2.5, 3.0, "Aujourd'hui on parle de fusées"),
            ],
            Utc::now(),
        )
    }

    #[test]
    fn test_native_transcript_keeps_track_language() {
        let transcript = french();
        assert_eq!(transcript.language(), "fr");
        assert!(!transcript.is_generated());
        assert_eq!(transcript.duration_seconds(), 5.5);
        assert_eq!(transcript.full_text(), "Bonjour à tous Aujourd'hui on parle de fusées");
    }

    #[test]
    fn test_translated_transcript_is_english_and_generated() {
        let source = french();
        let translated = Transcript::translated(
            &source,
            vec![TranscriptSegment::new(0.0, 2.5, "Hello everyone")],
            Utc::now(),
        );
        assert_eq!(translated.video_id(), "fr123");
        assert_eq!(translated.language(), "en");
        assert!(translated.is_generated());
    }

    #[test]
    fn test_language_helpers() {
        assert_eq!(primary_language("en-GB"), "en");
        assert_eq!(primary_language("pt_BR"), "pt");
        assert!(is_english("EN"));
        assert!(!is_english("fr"));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(65.0), "01:05");
        assert_eq!(format_timestamp(3665.0), "01:01:05");
    }
}
