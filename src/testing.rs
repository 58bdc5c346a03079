//! In-crate fakes for the external collaborators.

use crate::embedding::Embedder;
use crate::error::{Result, SporError};
use crate::generation::{GenerationRequest, LanguageModel};
use crate::transcript::{CaptionTrack, TranscriptSegment, TranscriptSource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Caption source serving fixed tracks.
#[derive(Default)]
pub struct FakeSource {
    tracks: Vec<CaptionTrack>,
    captions: HashMap<String, Vec<TranscriptSegment>>,
    list_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(mut self, track: CaptionTrack, segments: Vec<TranscriptSegment>) -> Self {
        self.captions.insert(track.language.clone(), segments);
        self.tracks.push(track);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptSource for FakeSource {
    async fn list_tracks(&self, _video_id: &str) -> Result<Vec<CaptionTrack>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tracks.clone())
    }

    async fn fetch_captions(&self, video_id: &str, language: &str) -> Result<Vec<TranscriptSegment>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.captions
            .get(language)
            .cloned()
            .ok_or_else(|| SporError::NoCaptions(video_id.to_string()))
    }
}

type Script = dyn Fn(&GenerationRequest) -> Result<String> + Send + Sync;

/// Language model answering from a closure.
pub struct ScriptedModel {
    script: Box<Script>,
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedModel {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Replies in order, repeating the last one.
    pub fn sequence(replies: &[&str]) -> Self {
        let replies: Vec<String> = replies.iter().map(|r| r.to_string()).collect();
        let next = AtomicUsize::new(0);
        Self::new(move |_| {
            let i = next.fetch_add(1, Ordering::SeqCst).min(replies.len() - 1);
            Ok(replies[i].clone())
        })
    }

    pub fn failing() -> Self {
        Self::new(|_| Err(SporError::Generation("provider unavailable".into())))
    }

    pub fn timing_out() -> Self {
        Self::new(|_| Err(SporError::GenerationTimeout(30)))
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.script)(request)
    }
}

/// Embedder with one dimension per axis. An axis lists `|`-separated keywords
/// and a text scores 1.0 on it if it contains any of them. A constant extra
/// dimension keeps vectors non-zero.
pub struct FakeEmbedder {
    axes: Vec<String>,
    model_version: String,
    embedded: AtomicUsize,
    fail: bool,
}

impl FakeEmbedder {
    pub fn with_axes(axes: &[&str]) -> Self {
        Self {
            axes: axes.iter().map(|a| a.to_lowercase()).collect(),
            model_version: "fake-v1".to_string(),
            embedded: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with_axes(&[])
        }
    }

    pub fn with_model_version(mut self, version: &str) -> Self {
        self.model_version = version.to_string();
        self
    }

    /// Number of texts embedded so far.
    pub fn embedded(&self) -> usize {
        self.embedded.load(Ordering::SeqCst)
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        let mut vector: Vec<f32> = self
            .axes
            .iter()
            .map(|axis| {
                if axis.split('|').any(|keyword| text.contains(keyword)) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        vector.push(0.1);
        vector
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| SporError::Embedding("empty batch".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.fail {
            return Err(SporError::Embedding("provider unavailable".into()));
        }
        self.embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }
}
