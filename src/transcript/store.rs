//! Cached transcript resolution.

use super::{
    is_english, primary_language, CaptionTrack, LanguageOption, Transcript, TranscriptSource,
    Translator, ENGLISH,
};
use crate::cache::{self, keys, CacheStore};
use crate::clock::Clock;
use crate::error::{Result, SporError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Label of the AI-translated English option.
const TRANSLATED_ENGLISH_NAME: &str = "English (AI translated)";

/// Resolves transcripts in a requested language, fetching native tracks and
/// producing English translations on demand.
///
/// Native tracks and translations are cached under separate keys. Only
/// successful results are written.
pub struct TranscriptStore {
    source: Arc<dyn TranscriptSource>,
    translator: Arc<Translator>,
    cache: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    transcript_ttl: Duration,
    translation_ttl: Duration,
}

impl TranscriptStore {
    pub fn new(
        source: Arc<dyn TranscriptSource>,
        translator: Arc<Translator>,
        cache: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            translator,
            cache,
            clock,
            transcript_ttl: Duration::from_secs(30 * 24 * 3600),
            translation_ttl: Duration::from_secs(7 * 24 * 3600),
        }
    }

    pub fn with_ttls(mut self, transcript_ttl: Duration, translation_ttl: Duration) -> Self {
        self.transcript_ttl = transcript_ttl;
        self.translation_ttl = translation_ttl;
        self
    }

    /// Resolve a transcript for the first satisfiable requested language.
    ///
    /// A request for English that no native track satisfies is answered with
    /// an AI translation (`language = "en"`, `is_generated = true`). Other
    /// unmatched requests fall back to the first native track, labelled with
    /// its own language.
    #[instrument(skip(self))]
    pub async fn resolve(&self, video_id: &str, requested: &[String]) -> Result<Transcript> {
        let requested: Vec<String> = if requested.is_empty() {
            vec![ENGLISH.to_string()]
        } else {
            requested.iter().map(|l| l.trim().to_string()).collect()
        };

        for language in &requested {
            if let Some(transcript) = self.cached_native(video_id, language).await? {
                info!("Transcript cache hit for {} ({})", video_id, language);
                return Ok(transcript);
            }
        }

        let tracks = self.source.list_tracks(video_id).await?;
        if tracks.is_empty() {
            return Err(SporError::NoCaptions(video_id.to_string()));
        }

        for language in &requested {
            if let Some(track) = match_track(&tracks, language) {
                return self.native(video_id, track).await;
            }
        }

        if requested.iter().any(|l| is_english(l)) {
            return self.english_translation(video_id, &tracks).await;
        }

        warn!(
            "None of {:?} available for {}, using {} track",
            requested, video_id, tracks[0].language
        );
        self.native(video_id, &tracks[0]).await
    }

    /// Languages a caller can request for a video.
    ///
    /// Includes the translated English option only when a translation is
    /// already cached.
    #[instrument(skip(self))]
    pub async fn available_languages(&self, video_id: &str) -> Result<Vec<LanguageOption>> {
        let tracks = self.source.list_tracks(video_id).await?;

        let mut options: Vec<LanguageOption> = tracks
            .iter()
            .map(|t| LanguageOption {
                code: t.language.clone(),
                name: t.name.clone(),
                is_translation: false,
            })
            .collect();

        let has_native_english = tracks.iter().any(|t| is_english(&t.language));
        if !has_native_english && self.cached_translation(video_id, &tracks).await?.is_some() {
            options.push(LanguageOption {
                code: ENGLISH.to_string(),
                name: TRANSLATED_ENGLISH_NAME.to_string(),
                is_translation: true,
            });
        }

        Ok(options)
    }

    /// Time left before the cache entry backing `transcript` expires.
    ///
    /// Artifacts derived from a transcript must not outlive it.
    pub fn remaining_lifetime(&self, transcript: &Transcript) -> Duration {
        let ttl = if transcript.is_generated() {
            self.translation_ttl
        } else {
            self.transcript_ttl
        };

        let age = self.clock.now() - transcript.fetched_at();
        match age.to_std() {
            Ok(age) => ttl.saturating_sub(age),
            // fetched_at in the future
            Err(_) => ttl,
        }
    }

    async fn cached_native(&self, video_id: &str, language: &str) -> Result<Option<Transcript>> {
        let key = keys::transcript(video_id, language);
        let cached: Option<Transcript> = cache::get_json(self.cache.as_ref(), &key).await?;
        Ok(cached.filter(|t| !t.is_generated()))
    }

    async fn native(&self, video_id: &str, track: &CaptionTrack) -> Result<Transcript> {
        if let Some(transcript) = self.cached_native(video_id, &track.language).await? {
            debug!("Transcript cache hit for {} ({})", video_id, track.language);
            return Ok(transcript);
        }

        let segments = self.source.fetch_captions(video_id, &track.language).await?;
        if segments.is_empty() {
            return Err(SporError::NoCaptions(video_id.to_string()));
        }

        let transcript = Transcript::native(video_id, track, segments, self.clock.now());
        cache::set_json(
            self.cache.as_ref(),
            &keys::transcript(video_id, &track.language),
            &transcript,
            self.transcript_ttl,
        )
        .await?;

        info!(
            "Fetched {} transcript for {} ({} segments)",
            track.language,
            video_id,
            transcript.segments().len()
        );
        Ok(transcript)
    }

    async fn cached_translation(
        &self,
        video_id: &str,
        tracks: &[CaptionTrack],
    ) -> Result<Option<Transcript>> {
        for track in tracks {
            let key = keys::translation(video_id, &track.language);
            let cached: Option<Transcript> = cache::get_json(self.cache.as_ref(), &key).await?;
            if let Some(transcript) = cached.filter(|t| t.is_generated() && t.language() == ENGLISH) {
                debug!("Translation cache hit for {} (from {})", video_id, track.language);
                return Ok(Some(transcript));
            }
        }
        Ok(None)
    }

    async fn english_translation(&self, video_id: &str, tracks: &[CaptionTrack]) -> Result<Transcript> {
        if let Some(transcript) = self.cached_translation(video_id, tracks).await? {
            info!("Serving cached English translation for {}", video_id);
            return Ok(transcript);
        }

        let track = tracks
            .iter()
            .find(|t| !t.is_auto)
            .unwrap_or(&tracks[0]);

        info!("No English track for {}, translating from {}", video_id, track.language);
        let source = self.native(video_id, track).await?;
        let translated = self.translator.translate(&source, self.clock.now()).await?;

        cache::set_json(
            self.cache.as_ref(),
            &keys::translation(video_id, &track.language),
            &translated,
            self.translation_ttl,
        )
        .await?;

        Ok(translated)
    }
}

/// Exact language match first, then a match on the primary subtag.
fn match_track<'a>(tracks: &'a [CaptionTrack], language: &str) -> Option<&'a CaptionTrack> {
    tracks
        .iter()
        .find(|t| t.language.eq_ignore_ascii_case(language))
        .or_else(|| {
            let primary = primary_language(language);
            tracks.iter().find(|t| primary_language(&t.language) == primary)
        })
}
