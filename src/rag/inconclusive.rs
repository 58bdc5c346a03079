//! Detection of "topic not found" answers.

use crate::config::InconclusivePhrases;
use std::collections::HashSet;

/// Decides whether a generated answer says the context did not cover the
/// question.
///
/// The whole answer must match a known phrase after normalization. Answers
/// that merely mention such a phrase alongside real content are conclusive.
#[derive(Debug, Clone)]
pub struct InconclusiveDetector {
    phrases: HashSet<String>,
}

impl InconclusiveDetector {
    pub fn new(config: &InconclusivePhrases) -> Self {
        let phrases = std::iter::once(&config.sentinel)
            .chain(config.phrases.iter())
            .map(|p| normalize(p))
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases }
    }

    pub fn is_inconclusive(&self, answer: &str) -> bool {
        let normalized = normalize(answer);
        normalized.is_empty() || self.phrases.contains(&normalized)
    }
}

impl Default for InconclusiveDetector {
    fn default() -> Self {
        Self::new(&InconclusivePhrases::default())
    }
}

/// Lowercase, collapse whitespace and strip surrounding punctuation and quotes.
fn normalize(text: &str) -> String {
    let collapsed = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    collapsed
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace() || is_quote(c))
        .to_string()
}

fn is_quote(c: char) -> bool {
    matches!(c, '\u{201C}' | '\u{201D}' | '\u{2018}' | '\u{2019}' | '\u{00AB}' | '\u{00BB}')
}
