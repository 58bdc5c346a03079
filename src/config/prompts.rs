//! Prompt templates for Spor.
//!
//! Prompts can be customized by pointing `prompts.custom_file` at a TOML file
//! with any of the `[chat]`, `[translation]` or `[inconclusive]` tables.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub chat: ChatPrompts,
    pub translation: TranslationPrompts,
    /// Phrases that mark an answer as "topic not found".
    pub inconclusive: InconclusivePhrases,
}

/// Prompts for answering questions about a video.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatPrompts {
    pub system: String,
    pub user: String,
}

impl Default for ChatPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an AI assistant helping users understand video content through conversational Q&A.

Your role:
- Answer questions accurately based on the transcript excerpts provided
- Be conversational and helpful
- When relevant, cite timestamps from the excerpts (e.g., "At 2:35, the speaker mentions...")
- Keep answers concise but informative (2-4 sentences typically)

Guidelines:
- Focus on what's actually said in the video
- Don't make assumptions beyond the transcript
- For technical content, explain clearly without oversimplifying

CRITICAL CONSTRAINTS:
- You must ONLY use information explicitly stated in the excerpts. Do NOT infer, assume, or add external knowledge
- Apply semantic understanding beyond simple keyword matching to capture the true meaning and context
- If the excerpts do not answer the question, reply with exactly this sentence and nothing else: {{sentinel}}"#
                .to_string(),

            user: r#"Video transcript excerpts:
{{context}}
{{history}}
User: {{question}}"#
                .to_string(),
        }
    }
}

/// Prompts for translating caption segments to English.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationPrompts {
    pub system: String,
    pub user: String,
}

impl Default for TranslationPrompts {
    fn default() -> Self {
        Self {
            system: r#"You translate video captions into English.

Rules:
- Each input line starts with a marker like [12]. Keep every marker exactly as given
- Output exactly one line per input line, in the same order
- Translate only the text after the marker
- Only output the translation, nothing else"#
                .to_string(),

            user: r#"Translate the following {{source_language}} caption lines to English.

{{lines}}"#
                .to_string(),
        }
    }
}

/// Phrases meaning "not discussed / no information found".
///
/// An answer is inconclusive only if the whole (normalized) answer equals one
/// of these, never when the phrase merely occurs inside a longer answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InconclusivePhrases {
    /// The sentence the model is told to reply with.
    pub sentinel: String,
    /// Other whole-answer forms accepted as inconclusive.
    pub phrases: Vec<String>,
}

impl Default for InconclusivePhrases {
    fn default() -> Self {
        Self {
            sentinel: "This topic is not discussed in the video.".to_string(),
            phrases: vec![
                "This topic is not discussed in the video".to_string(),
                "The topic is not discussed in the video".to_string(),
                "This is not discussed in the video".to_string(),
                "Not discussed in the video".to_string(),
                "The video does not discuss this topic".to_string(),
                "This is not mentioned in the video".to_string(),
                "The transcript does not contain this information".to_string(),
                "The transcript does not contain information about this".to_string(),
                "There is no information about this in the video".to_string(),
                "No information found".to_string(),
            ],
        }
    }
}

impl Prompts {
    /// Load prompts, overriding defaults from a custom TOML file if given.
    pub fn load(custom_file: Option<&str>) -> crate::error::Result<Self> {
        let Some(file) = custom_file else {
            return Ok(Prompts::default());
        };

        let path = PathBuf::from(shellexpand::tilde(file).to_string());
        if !path.exists() {
            return Err(crate::error::SporError::Config(format!(
                "Prompt file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Placeholders are substituted in a single pass, so `{{name}}` inside a
    /// substituted value is left as is. Unknown placeholders are kept.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
        let Some(placeholder) = PLACEHOLDER
            .get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").ok())
            .as_ref()
        else {
            return template.to_string();
        };

        placeholder
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// The chat system prompt with the sentinel filled in.
    pub fn chat_system(&self) -> String {
        let mut vars = HashMap::new();
        vars.insert("sentinel".to_string(), self.inconclusive.sentinel.clone());
        Self::render(&self.chat.system, &vars)
    }
}
