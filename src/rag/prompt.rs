//! Chat prompt construction.

use super::{ChatMessage, ChatRole};
use crate::config::Prompts;
use crate::generation::GenerationRequest;
use crate::retrieval::RetrievalResult;
use std::collections::HashMap;

/// Builds answer prompts from retrieved chunks and chat history.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system: String,
    user_template: String,
    history_messages: usize,
    temperature: f32,
    max_tokens: u32,
}

impl PromptBuilder {
    pub fn new(prompts: &Prompts) -> Self {
        Self {
            system: prompts.chat_system(),
            user_template: prompts.chat.user.clone(),
            history_messages: 6,
            temperature: 0.7,
            max_tokens: 500,
        }
    }

    /// Number of most recent history messages to include.
    pub fn with_history_messages(mut self, history_messages: usize) -> Self {
        self.history_messages = history_messages;
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn build(&self, retrieved: &RetrievalResult, question: &str, history: &[ChatMessage]) -> GenerationRequest {
        let mut vars = HashMap::new();
        vars.insert("context".to_string(), format_context(retrieved));
        vars.insert("history".to_string(), self.format_history(history));
        vars.insert("question".to_string(), question.trim().to_string());

        GenerationRequest::new(self.system.clone(), Prompts::render(&self.user_template, &vars))
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }

    fn format_history(&self, history: &[ChatMessage]) -> String {
        let skip = history.len().saturating_sub(self.history_messages);
        history[skip..]
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    ChatRole::User => "User",
                    ChatRole::Assistant => "Assistant",
                };
                format!("\n{}: {}", role, msg.content)
            })
            .collect()
    }
}

/// Chunks in retrieval order, each prefixed with its start time.
fn format_context(retrieved: &RetrievalResult) -> String {
    retrieved
        .chunks
        .iter()
        .map(|c| format!("[{}] {}", c.format_timestamp(), c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}
