//! Transcript module for Spor.
//!
//! Fetches captions from a [`TranscriptSource`], translates them to English
//! when needed, and caches both behind the [`TranscriptStore`].
//!
//! # Language resolution
//!
//! A request for English on a video without an English track is answered
//! with an AI translation, never with a native track of another language
//! under the English label.

mod models;
mod store;
mod translate;
mod youtube;

pub use models::{
    format_timestamp, is_english, primary_language, CaptionTrack, LanguageOption, Transcript,
    TranscriptSegment, ENGLISH,
};
pub use store::TranscriptStore;
pub use translate::Translator;
pub use youtube::YoutubeCaptionSource;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for caption providers.
///
/// Implementations report terminal conditions as
/// [`SporError::NoCaptions`](crate::error::SporError::NoCaptions) or
/// [`SporError::Blocked`](crate::error::SporError::Blocked), and handle their
/// own retries for transient failures.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// List the caption tracks a video offers natively.
    async fn list_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>>;

    /// Fetch the segments of one native track.
    async fn fetch_captions(&self, video_id: &str, language: &str) -> Result<Vec<TranscriptSegment>>;
}
