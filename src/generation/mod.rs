//! Text generation for answers and translation.

mod openai;
mod retry;

pub use openai::OpenAIChatModel;
pub use retry::RetryPolicy;

use crate::error::Result;
use async_trait::async_trait;

/// A single prompt for the model.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// System instructions.
    pub system: String,
    /// User message.
    pub user: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens in the response.
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.7,
            max_tokens: 500,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Trait for generative models.
///
/// Failures are reported as
/// [`SporError::GenerationTimeout`](crate::error::SporError::GenerationTimeout)
/// or [`SporError::Generation`](crate::error::SporError::Generation); both are
/// retryable.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for the request.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}
