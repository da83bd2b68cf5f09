//! # Nudge Providers
//!
//! Text-generation clients for Nudge.
//!
//! Every provider speaks one of two wire protocols: OpenAI-compatible chat
//! completions (OpenAI, Groq, OpenRouter, Ollama) or Gemini's direct
//! `generateContent` REST call. The protocol is picked from the registry when
//! the client is built; retries and output cleanup are shared.

pub mod client;
pub mod gemini;
pub mod openai_compatible;
pub mod provider_registry;
pub mod retry;
pub mod sanitize;

pub use client::{GenerateParams, GenerationClient};
pub use retry::RetryPolicy;
pub use sanitize::clean_message;

use nudge_core::config::LlmConfig;
use nudge_core::error::Result;

/// Create a generation client from configuration.
pub fn create_client(llm: &LlmConfig) -> Result<GenerationClient> {
    GenerationClient::from_config(llm)
}

