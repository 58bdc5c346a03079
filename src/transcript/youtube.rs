//! YouTube caption source.
//!
//! Track discovery goes through `yt-dlp --dump-json`, which lists manual
//! subtitles and automatic captions with direct download URLs. Caption bodies
//! are fetched in YouTube's `json3` format.

use super::{CaptionTrack, TranscriptSegment, TranscriptSource};
use crate::error::{Result, SporError};
use crate::generation::RetryPolicy;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Caption URLs expire after a few hours; keep discovered tracks briefly.
const TRACK_LIST_TTL: Duration = Duration::from_secs(600);
const TRANSIENT_ATTEMPTS: u32 = 2;
const TRANSIENT_BACKOFF: Duration = Duration::from_millis(500);
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct YoutubeTrack {
    track: CaptionTrack,
    url: String,
}

/// Recently discovered tracks per video. Expired entries are dropped on
/// every insert.
#[derive(Default)]
struct TrackCache {
    entries: HashMap<String, (Instant, Vec<YoutubeTrack>)>,
}

impl TrackCache {
    fn get(&self, video_id: &str, now: Instant) -> Option<Vec<YoutubeTrack>> {
        self.entries
            .get(video_id)
            .filter(|(at, _)| now.saturating_duration_since(*at) < TRACK_LIST_TTL)
            .map(|(_, list)| list.clone())
    }

    fn insert(&mut self, video_id: &str, tracks: Vec<YoutubeTrack>, now: Instant) {
        self.entries
            .retain(|_, (at, _)| now.saturating_duration_since(*at) < TRACK_LIST_TTL);
        self.entries.insert(video_id.to_string(), (now, tracks));
    }
}

/// YouTube caption source backed by yt-dlp.
pub struct YoutubeCaptionSource {
    ytdlp_path: String,
    http: reqwest::Client,
    video_id_regex: Regex,
    retry: RetryPolicy,
    tracks: Mutex<TrackCache>,
}

impl YoutubeCaptionSource {
    pub fn new(ytdlp_path: &str) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        // Matches various YouTube URL formats and bare video IDs
        let video_id_regex = Regex::new(
            r"(?x)
            (?:
                (?:https?://)?
                (?:www\.|m\.)?
                (?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/shorts/)
                ([a-zA-Z0-9_-]{11})
            )
            |
            ^([a-zA-Z0-9_-]{11})$
        ",
        )
        .map_err(|e| SporError::Config(format!("Invalid video id pattern: {}", e)))?;

        Ok(Self {
            ytdlp_path: ytdlp_path.to_string(),
            http,
            video_id_regex,
            retry: RetryPolicy::new(TRANSIENT_ATTEMPTS, TRANSIENT_BACKOFF),
            tracks: Mutex::new(TrackCache::default()),
        })
    }

    /// Extract a video ID from a YouTube URL or bare ID.
    pub fn extract_video_id(&self, input: &str) -> Option<String> {
        let caps = self.video_id_regex.captures(input.trim())?;

        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
    }

    fn cached_tracks(&self, video_id: &str) -> Option<Vec<YoutubeTrack>> {
        self.tracks.lock().ok()?.get(video_id, Instant::now())
    }

    /// Retry transient failures once; terminal errors return immediately.
    async fn with_transient_retry<T, F, Fut>(&self, label: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.retry
            .run_if(label, |e| matches!(e, SporError::TransientSource(_)), op)
            .await
    }

    async fn discover_tracks(&self, video_id: &str) -> Result<Vec<YoutubeTrack>> {
        if let Some(tracks) = self.cached_tracks(video_id) {
            return Ok(tracks);
        }

        let tracks = self
            .with_transient_retry("yt-dlp metadata", || self.run_ytdlp(video_id))
            .await?;

        if let Ok(mut cache) = self.tracks.lock() {
            cache.insert(video_id, tracks.clone(), Instant::now());
        }
        Ok(tracks)
    }

    async fn run_ytdlp(&self, video_id: &str) -> Result<Vec<YoutubeTrack>> {
        let url = format!("https://www.youtube.com/watch?v={}", video_id);

        let output = tokio::process::Command::new(&self.ytdlp_path)
            .args(["--dump-json", "--skip-download", "--no-warnings", &url])
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    SporError::ToolNotFound(self.ytdlp_path.clone())
                } else {
                    SporError::TransientSource(format!("Failed to run yt-dlp: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_ytdlp_error(video_id, &stderr));
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            SporError::TransientSource(format!("Failed to parse yt-dlp output: {}", e))
        })?;

        let tracks = parse_tracks(&json);
        debug!("Discovered {} caption tracks for {}", tracks.len(), video_id);
        Ok(tracks)
    }

    async fn download_json3(&self, url: &str) -> Result<Vec<TranscriptSegment>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SporError::TransientSource(format!("Caption download failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SporError::Blocked(format!("Caption download returned {}", status)));
        }
        if !status.is_success() {
            return Err(SporError::TransientSource(format!(
                "Caption download returned {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SporError::TransientSource(format!("Caption download failed: {}", e)))?;
        parse_json3(&body)
    }
}

#[async_trait]
impl TranscriptSource for YoutubeCaptionSource {
    #[instrument(skip(self))]
    async fn list_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>> {
        let tracks = self.discover_tracks(video_id).await?;
        Ok(tracks.into_iter().map(|t| t.track).collect())
    }

    #[instrument(skip(self))]
    async fn fetch_captions(&self, video_id: &str, language: &str) -> Result<Vec<TranscriptSegment>> {
        let tracks = self.discover_tracks(video_id).await?;
        let track = tracks
            .iter()
            .find(|t| t.track.language == language)
            .ok_or_else(|| SporError::NoCaptions(format!("{} has no '{}' track", video_id, language)))?;

        info!("Downloading {} captions for {}", language, video_id);
        let segments = self
            .with_transient_retry("caption download", || self.download_json3(&track.url))
            .await?;

        if segments.is_empty() {
            return Err(SporError::NoCaptions(format!(
                "{} '{}' track is empty",
                video_id, language
            )));
        }
        Ok(segments)
    }
}

/// Map yt-dlp's stderr onto the source error kinds.
fn classify_ytdlp_error(video_id: &str, stderr: &str) -> SporError {
    let lower = stderr.to_lowercase();

    if lower.contains("sign in to confirm")
        || lower.contains("http error 429")
        || lower.contains("too many requests")
        || lower.contains("blocked")
    {
        SporError::Blocked(format!("YouTube is blocking requests for {}", video_id))
    } else if lower.contains("video unavailable")
        || lower.contains("private video")
        || lower.contains("has been removed")
        || lower.contains("does not exist")
    {
        SporError::NoCaptions(format!("Video {} is unavailable", video_id))
    } else {
        SporError::TransientSource(format!("yt-dlp failed for {}: {}", video_id, stderr.trim()))
    }
}

fn json3_url(formats: &serde_json::Value) -> Option<String> {
    formats.as_array()?.iter().find_map(|f| {
        if f["ext"].as_str() == Some("json3") {
            f["url"].as_str().map(|s| s.to_string())
        } else {
            None
        }
    })
}

fn track_name(formats: &serde_json::Value, fallback: &str) -> String {
    formats
        .as_array()
        .and_then(|list| list.iter().find_map(|f| f["name"].as_str()))
        .unwrap_or(fallback)
        .to_string()
}

/// Extract native caption tracks from yt-dlp metadata.
///
/// Manual subtitles are native. Of the automatic captions only the original
/// speech-recognition track counts: the rest are YouTube's machine
/// translations of it.
fn parse_tracks(json: &serde_json::Value) -> Vec<YoutubeTrack> {
    let mut tracks: Vec<YoutubeTrack> = Vec::new();

    if let Some(subtitles) = json["subtitles"].as_object() {
        let mut languages: Vec<_> = subtitles.keys().collect();
        languages.sort();
        for language in languages {
            if language == "live_chat" {
                continue;
            }
            let formats = &subtitles[language];
            if let Some(url) = json3_url(formats) {
                tracks.push(YoutubeTrack {
                    track: CaptionTrack::new(language.as_str(), track_name(formats, language), false),
                    url,
                });
            }
        }
    }

    if let Some(automatic) = json["automatic_captions"].as_object() {
        let original = automatic
            .iter()
            .find(|(key, _)| key.ends_with("-orig"))
            .map(|(key, formats)| (key.trim_end_matches("-orig").to_string(), formats))
            .or_else(|| {
                let language = json["language"].as_str()?;
                automatic.get(language).map(|f| (language.to_string(), f))
            });

        if let Some((language, formats)) = original {
            let has_manual = tracks.iter().any(|t| t.track.language == language);
            if let (false, Some(url)) = (has_manual, json3_url(formats)) {
                tracks.push(YoutubeTrack {
                    track: CaptionTrack::new(language.as_str(), track_name(formats, &language), true),
                    url,
                });
            }
        }
    }

    tracks
}

#[derive(Deserialize)]
struct Json3 {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    t_start_ms: Option<i64>,
    d_duration_ms: Option<i64>,
    #[serde(default)]
    segs: Vec<Json3Seg>,
}

#[derive(Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Parse a YouTube `json3` caption body into segments.
fn parse_json3(body: &str) -> Result<Vec<TranscriptSegment>> {
    let doc: Json3 = serde_json::from_str(body)
        .map_err(|e| SporError::TransientSource(format!("Invalid caption body: {}", e)))?;

    let segments = doc
        .events
        .into_iter()
        .filter_map(|event| {
            let start_ms = event.t_start_ms?;
            let text: String = event.segs.iter().map(|s| s.utf8.as_str()).collect();
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if text.is_empty() {
                return None;
            }
            Some(TranscriptSegment::new(
                start_ms as f64 / 1000.0,
                event.d_duration_ms.unwrap_or(0).max(0) as f64 / 1000.0,
                text,
            ))
        })
        .collect();

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id() {
        let source = YoutubeCaptionSource::new("yt-dlp").unwrap();

        assert_eq!(
            source.extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            source.extract_video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            source.extract_video_id("https://www.youtube.com/shorts/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            source.extract_video_id("dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );

        assert_eq!(source.extract_video_id("not-a-video-id"), None);
        assert_eq!(source.extract_video_id(""), None);
    }

    #[test]
    fn test_parse_tracks_ignores_machine_translations() {
        let json = serde_json::json!({
            "language": "fr",
            "subtitles": {
                "de": [{"ext": "vtt", "url": "https://x/de.vtt"}, {"ext": "json3", "url": "https://x/de", "name": "German"}],
                "live_chat": [{"ext": "json3", "url": "https://x/chat"}]
            },
            "automatic_captions": {
                "fr-orig": [{"ext": "json3", "url": "https://x/fr-orig", "name": "French (Original)"}],
                "en": [{"ext": "json3", "url": "https://x/en-from-fr"}],
                "es": [{"ext": "json3", "url": "https://x/es-from-fr"}]
            }
        });

        let tracks = parse_tracks(&json);
        let languages: Vec<_> = tracks.iter().map(|t| t.track.language.as_str()).collect();
        assert_eq!(languages, vec!["de", "fr"]);
        assert!(!tracks[0].track.is_auto);
        assert!(tracks[1].track.is_auto);
        assert_eq!(tracks[1].url, "https://x/fr-orig");
    }

    #[test]
    fn test_parse_tracks_falls_back_to_video_language() {
        let json = serde_json::json!({
            "language": "en",
            "automatic_captions": {
                "en": [{"ext": "json3", "url": "https://x/en"}],
                "fr": [{"ext": "json3", "url": "https://x/fr"}]
            }
        });

        let tracks = parse_tracks(&json);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].track.language, "en");
    }

    #[test]
    fn test_parse_json3() {
        let body = r#"{"events": [
            {"tStartMs": 0, "dDurationMs": 2500, "segs": [{"utf8": "Bonjour"}, {"utf8": " à tous"}]},
            {"tStartMs": 2500, "dDurationMs": 10, "segs": [{"utf8": "\n"}]},
            {"tStartMs": 2600},
            {"tStartMs": 3000, "dDurationMs": 2000, "segs": [{"utf8": "on parle\nde fusées"}]}
        ]}"#;

        let segments = parse_json3(body).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], TranscriptSegment::new(0.0, 2.5, "Bonjour à tous"));
        assert_eq!(segments[1].text, "on parle de fusées");
        assert_eq!(segments[1].start, 3.0);
    }

    #[test]
    fn test_classify_ytdlp_error() {
        assert!(matches!(
            classify_ytdlp_error("x", "ERROR: Sign in to confirm you're not a bot"),
            SporError::Blocked(_)
        ));
        assert!(matches!(
            classify_ytdlp_error("x", "ERROR: [youtube] x: Video unavailable"),
            SporError::NoCaptions(_)
        ));
        assert!(matches!(
            classify_ytdlp_error("x", "ERROR: Connection reset"),
            SporError::TransientSource(_)
        ));
    }

    #[test]
    fn test_track_cache_drops_expired_entries_on_insert() {
        let start = Instant::now();
        let mut cache = TrackCache::default();

        cache.insert("first", Vec::new(), start);
        cache.insert("second", Vec::new(), start + Duration::from_secs(60));
        assert_eq!(cache.entries.len(), 2);

        let later = start + TRACK_LIST_TTL + Duration::from_secs(1);
        assert!(cache.get("first", later).is_none());

        cache.insert("third", Vec::new(), later);
        assert_eq!(cache.entries.len(), 2);
        assert!(cache.get("second", later).is_some());
        assert!(cache.get("third", later).is_some());
    }
}
