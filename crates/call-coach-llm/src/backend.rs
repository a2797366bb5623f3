//! Generation service trait and request/response types

use async_trait::async_trait;
use thiserror::Error;

use crate::prompt::Message;

/// LLM errors
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    /// The call exceeded its latency budget. Degrades to "no suggestion";
    /// never surfaced to the user.
    #[error("Generation timed out")]
    Timeout,

    /// Network or API failure. Degrades the same way; consecutive Tier 3
    /// service errors feed the circuit breaker.
    #[error("Generation service error: {0}")]
    Service(String),

    /// The service returned something unusable.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Request to the generation service
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// Chat messages, system prompt first
    pub messages: Vec<Message>,
    /// Token cap for the response
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

/// Response from the generation service
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    /// Generated text, possibly carrying structured markers
    pub text: String,
    /// Tokens generated, when the backend reports it
    pub tokens_generated: Option<u32>,
}

impl GenerateResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens_generated: None,
        }
    }
}

/// Opaque text-generation capability. Prompt in, text out, fails with
/// `Timeout` or `Service`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError>;
}
