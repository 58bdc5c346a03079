//! AI translation of transcripts to English.
//!
//! Segments are sent in numbered batches (`[12] text`) and mapped back by
//! number, so translated text keeps the original timing. If the model breaks
//! the numbering, the batch's words are redistributed over its segments in
//! proportion to the source word counts.

use super::{Transcript, TranscriptSegment};
use crate::config::TranslationPrompts;
use crate::error::{Result, SporError};
use crate::generation::{GenerationRequest, LanguageModel, RetryPolicy};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Translates transcripts to English with a language model.
pub struct Translator {
    model: Arc<dyn LanguageModel>,
    prompts: TranslationPrompts,
    retry: RetryPolicy,
    temperature: f32,
    max_tokens: u32,
    batch_segments: usize,
    max_concurrent: usize,
    line_regex: Regex,
}

impl Translator {
    pub fn new(model: Arc<dyn LanguageModel>, prompts: TranslationPrompts) -> Result<Self> {
        let line_regex = Regex::new(r"^\s*\[(\d+)\]\s?(.*)$")
            .map_err(|e| SporError::Config(format!("Invalid line pattern: {}", e)))?;

        Ok(Self {
            model,
            prompts,
            retry: RetryPolicy::default(),
            temperature: 0.3,
            max_tokens: 4096,
            batch_segments: 120,
            max_concurrent: 2,
            line_regex,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_batching(mut self, batch_segments: usize, max_concurrent: usize) -> Self {
        self.batch_segments = batch_segments.max(1);
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Translate `source` to English.
    ///
    /// Fails rather than returning a partial or empty translation.
    #[instrument(skip(self, source, now), fields(video_id = %source.video_id(), from = %source.language()))]
    pub async fn translate(&self, source: &Transcript, now: DateTime<Utc>) -> Result<Transcript> {
        let segments = source.segments();
        if segments.is_empty() {
            return Err(SporError::Translation(format!(
                "{} has no text to translate",
                source.video_id()
            )));
        }

        info!(
            "Translating {} segments from {} in batches of {}",
            segments.len(),
            source.language(),
            self.batch_segments
        );

        // Batch futures own their inputs so they stay Send.
        let batches: Vec<_> = segments
            .chunks(self.batch_segments)
            .enumerate()
            .map(|(i, batch)| {
                self.translate_batch(
                    source.language().to_string(),
                    i * self.batch_segments,
                    batch.to_vec(),
                )
            })
            .collect();

        let translated: Vec<Vec<TranscriptSegment>> = stream::iter(batches)
            .buffered(self.max_concurrent)
            .try_collect()
            .await?;

        let translated: Vec<TranscriptSegment> = translated.into_iter().flatten().collect();
        Ok(Transcript::translated(source, translated, now))
    }

    async fn translate_batch(
        &self,
        source_language: String,
        offset: usize,
        batch: Vec<TranscriptSegment>,
    ) -> Result<Vec<TranscriptSegment>> {
        let lines = batch
            .iter()
            .enumerate()
            .map(|(i, seg)| format!("[{}] {}", offset + i, seg.text))
            .collect::<Vec<_>>()
            .join("\n");

        let mut vars = HashMap::new();
        vars.insert("source_language".to_string(), source_language);
        vars.insert("lines".to_string(), lines);

        let request = GenerationRequest::new(
            self.prompts.system.clone(),
            crate::config::Prompts::render(&self.prompts.user, &vars),
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens);

        let response = self
            .retry
            .run("translation", || self.model.generate(&request))
            .await
            .map_err(|e| SporError::Translation(e.to_string()))?;

        if response.trim().is_empty() {
            return Err(SporError::Translation("Model returned an empty translation".into()));
        }

        let numbered = self.map_numbered_lines(&response, offset, batch.len());
        let matched = numbered.iter().filter(|t| t.is_some()).count();

        // Replies with too few markers are refusals or chatter, not translations
        if matched == 0 || matched * 2 < batch.len() {
            return Err(SporError::Translation(format!(
                "Model reply matched {} of {} lines in batch at {}",
                matched,
                batch.len(),
                offset
            )));
        }

        let texts = match numbered.into_iter().collect::<Option<Vec<String>>>() {
            Some(texts) => texts,
            None => {
                warn!(
                    "Translation of batch at {} lost some line markers, redistributing words",
                    offset
                );
                redistribute_words(&self.strip_markers(&response), &batch)
            }
        };

        debug!("Translated batch at {} ({} segments)", offset, batch.len());

        Ok(batch
            .iter()
            .zip(texts)
            .map(|(seg, text)| TranscriptSegment::new(seg.start, seg.duration, text))
            .collect())
    }

    /// Map `[n] text` lines back to batch positions.
    fn map_numbered_lines(&self, response: &str, offset: usize, len: usize) -> Vec<Option<String>> {
        let mut texts: Vec<Option<String>> = vec![None; len];

        for line in response.lines() {
            let Some(caps) = self.line_regex.captures(line) else {
                continue;
            };
            let Ok(index) = caps[1].parse::<usize>() else {
                continue;
            };
            let text = caps[2].trim();
            if index >= offset && index < offset + len && !text.is_empty() {
                texts[index - offset] = Some(text.to_string());
            }
        }

        texts
    }

    fn strip_markers(&self, response: &str) -> String {
        response
            .lines()
            .map(|line| match self.line_regex.captures(line) {
                Some(caps) => caps[2].to_string(),
                None => line.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Spread translated words over the source segments, proportionally to each
/// segment's source word count.
fn redistribute_words(text: &str, batch: &[TranscriptSegment]) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let weights: Vec<usize> = batch.iter().map(|s| s.word_count().max(1)).collect();
    let total_weight: usize = weights.iter().sum();

    let mut out = Vec::with_capacity(batch.len());
    let mut cumulative = 0;
    let mut taken = 0;

    for weight in weights {
        cumulative += weight;
        let boundary = (words.len() * cumulative + total_weight / 2) / total_weight;
        let boundary = boundary.clamp(taken, words.len());
        out.push(words[taken..boundary].join(" "));
        taken = boundary;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use crate::transcript::CaptionTrack;
    use std::time::Duration;

    fn french() -> Transcript {
        Transcript::native(
            "fr123",
            &CaptionTrack::new("fr", "French", false),
            vec![
                TranscriptSegment::new(0.0, 2.0, "Bonjour à tous"),
                TranscriptSegment::new(2.0, 3.0, "La fusée décolle le 15 mars"),
                TranscriptSegment::new(5.0, 2.0, "Merci"),
            ],
            Utc::now(),
        )
    }

    fn translator(model: Arc<ScriptedModel>) -> Translator {
        Translator::new(model, TranslationPrompts::default())
            .unwrap()
            .with_retry(RetryPolicy::new(2, Duration::ZERO))
    }

    #[tokio::test]
    async fn test_translate_maps_numbered_lines() {
        let model = Arc::new(ScriptedModel::replying(
            "[0] Hello everyone\n[1] The rocket lifts off on March 15\n[2] Thanks",
        ));
        let translated = translator(model.clone()).translate(&french(), Utc::now()).await.unwrap();

        assert_eq!(translated.language(), "en");
        assert!(translated.is_generated());
        assert_eq!(translated.segments().len(), 3);
        assert_eq!(translated.segments()[1].text, "The rocket lifts off on March 15");
        assert_eq!(translated.segments()[1].start, 2.0);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_translate_batches_segments() {
        let model = Arc::new(ScriptedModel::new(|request| {
            let lines: Vec<String> = request
                .user
                .lines()
                .filter(|l| l.starts_with('['))
                .map(|l| format!("{} (en)", l))
                .collect();
            Ok(lines.join("\n"))
        }));

        let translated = translator(model.clone())
            .with_batching(2, 1)
            .translate(&french(), Utc::now())
            .await
            .unwrap();

        assert_eq!(model.calls(), 2);
        assert_eq!(translated.segments()[2].text, "Merci (en)");
    }

    #[tokio::test]
    async fn test_translate_falls_back_to_redistribution() {
        let model = Arc::new(ScriptedModel::replying(
            "[0] Hello everyone\n[1] The rocket lifts off on March 15. Thanks",
        ));
        let translated = translator(model).translate(&french(), Utc::now()).await.unwrap();

        let texts: Vec<&str> = translated.segments().iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts.join(" "), "Hello everyone The rocket lifts off on March 15. Thanks");
        assert!(texts.iter().all(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn test_unnumbered_reply_is_an_error() {
        let model = Arc::new(ScriptedModel::replying("I'm sorry, I can't help with that."));
        let result = translator(model.clone()).translate(&french(), Utc::now()).await;

        assert!(matches!(result, Err(SporError::Translation(_))));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_mostly_unnumbered_reply_is_an_error() {
        let model = Arc::new(ScriptedModel::replying(
            "[0] Hello everyone\nThe rocket lifts off on March 15\nThanks",
        ));
        let result = translator(model).translate(&french(), Utc::now()).await;

        assert!(matches!(result, Err(SporError::Translation(_))));
    }

    #[tokio::test]
    async fn test_concurrent_batches_keep_order() {
        let model = Arc::new(ScriptedModel::new(|request| {
            let lines: Vec<String> = request
                .user
                .lines()
                .filter(|l| l.starts_with('['))
                .map(|l| format!("{} (en)", l))
                .collect();
            Ok(lines.join("\n"))
        }));

        let translated = translator(model.clone())
            .with_batching(1, 3)
            .translate(&french(), Utc::now())
            .await
            .unwrap();

        assert_eq!(model.calls(), 3);
        let texts: Vec<&str> = translated.segments().iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Bonjour à tous (en)", "La fusée décolle le 15 mars (en)", "Merci (en)"]);
    }

    #[tokio::test]
    async fn test_translate_failure_is_an_error() {
        let model = Arc::new(ScriptedModel::failing());
        let result = translator(model.clone()).translate(&french(), Utc::now()).await;

        assert!(matches!(result, Err(SporError::Translation(_))));
        assert_eq!(model.calls(), 2);
    }

    #[test]
    fn test_redistribute_words_keeps_every_word() {
        let batch = vec![
            TranscriptSegment::new(0.0, 1.0, "a b"),
            TranscriptSegment::new(1.0, 1.0, "c d e f"),
            TranscriptSegment::new(2.0, 1.0, "g b"),
        ];
        let out = redistribute_words("one two three four five six seven", &batch);
        assert_eq!(out.len(), 3);
        assert_eq!(out.join(" "), "one two three four five six seven");
        assert_eq!(out[0], "one two");
    }
}
