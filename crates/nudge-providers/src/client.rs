//! Generation client: one `generate` capability over a closed set of wire
//! protocols, with retry/backoff for transient failures and output cleanup.

use std::time::Duration;

use async_trait::async_trait;
use nudge_core::config::LlmConfig;
use nudge_core::error::{NudgeError, Result};
use nudge_core::traits::Generator;

use crate::gemini::GeminiProvider;
use crate::openai_compatible::OpenAiCompatibleProvider;
use crate::provider_registry::{self, AuthStyle, WireProtocol};
use crate::retry::{RetryPolicy, is_transient};
use crate::sanitize::clean_message;

/// Per-request generation settings.
#[derive(Debug, Clone)]
pub struct GenerateParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

/// The wire protocol chosen at construction.
pub enum Backend {
    ChatCompletions(OpenAiCompatibleProvider),
    GenerateContent(GeminiProvider),
}

impl Backend {
    async fn complete(&self, prompt: &str, params: &GenerateParams) -> Result<Option<String>> {
        match self {
            Self::ChatCompletions(p) => p.complete(prompt, params).await,
            Self::GenerateContent(p) => p.complete(prompt, params).await,
        }
    }
}

/// Client that writes reminders through a remote text-generation service.
pub struct GenerationClient {
    provider: String,
    backend: Backend,
    params: GenerateParams,
    retry: RetryPolicy,
}

impl GenerationClient {
    /// Create from the `[llm]` config section.
    ///
    /// Resolution order:
    /// - API key: `llm.api_key` > provider env vars
    /// - Base URL: `llm.base_url` > registry default
    /// - Model: `llm.model` > registry default
    pub fn from_config(llm: &LlmConfig) -> Result<Self> {
        let registry = provider_registry::get_provider_config(&llm.provider).ok_or_else(|| {
            NudgeError::ProviderNotFound(format!(
                "{} (supported: {})",
                llm.provider,
                provider_registry::all_provider_names().join(", ")
            ))
        })?;

        let api_key = if !llm.api_key.trim().is_empty() {
            llm.api_key.trim().to_string()
        } else {
            registry
                .env_keys
                .iter()
                .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
                .unwrap_or_default()
        };
        if registry.auth_style != AuthStyle::None && api_key.is_empty() {
            return Err(NudgeError::ApiKeyMissing(registry.name.into()));
        }

        let base_url = if llm.base_url.trim().is_empty() {
            registry.base_url.to_string()
        } else {
            llm.base_url.trim().to_string()
        };
        let model = if llm.model.trim().is_empty() {
            registry.default_model.to_string()
        } else {
            llm.model.trim().to_string()
        };

        let http = reqwest::Client::new();
        let backend = match registry.protocol {
            WireProtocol::ChatCompletions => Backend::ChatCompletions(
                OpenAiCompatibleProvider::new(registry.name, &api_key, &base_url, registry.auth_style, http),
            ),
            WireProtocol::GenerateContent => {
                Backend::GenerateContent(GeminiProvider::new(&api_key, &base_url, http))
            }
        };

        tracing::info!(
            "🧠 Generation client ready: provider={}, model={}",
            registry.name,
            model
        );

        Ok(Self {
            provider: registry.name.to_string(),
            backend,
            params: GenerateParams {
                model,
                max_tokens: llm.max_tokens,
                temperature: llm.temperature,
                timeout: Duration::from_secs(30),
            },
            retry: RetryPolicy::new(llm.max_retries.max(1)),
        })
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.params.model
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Generate one cleaned message, trying at most `max_retries` times.
    ///
    /// Transient failures are retried with exponential backoff; anything else,
    /// or the last transient failure, is returned to the caller.
    pub async fn generate_with_retries(
        &self,
        prompt: &str,
        max_retries: u32,
    ) -> Result<Option<String>> {
        let max_retries = max_retries.max(1);
        let mut attempt = 0;

        loop {
            tracing::debug!(
                "📤 Sending prompt (provider: {}, model: {}, attempt: {}/{})",
                self.provider,
                self.params.model,
                attempt + 1,
                max_retries
            );

            match self.backend.complete(prompt, &self.params).await {
                Ok(Some(raw)) => {
                    tracing::debug!("Raw model response: {}", preview(&raw, 200));
                    return match clean_message(&raw) {
                        Some(message) => {
                            tracing::info!(
                                "✅ Generated message ({} chars)",
                                message.chars().count()
                            );
                            Ok(Some(message))
                        }
                        None => {
                            tracing::error!("❌ Message cleanup failed, rejecting output");
                            Ok(None)
                        }
                    };
                }
                Ok(None) => {
                    tracing::warn!("⚠️ {} returned an empty response", self.provider);
                    return Ok(None);
                }
                Err(e) if is_transient(&e) && attempt + 1 < max_retries => {
                    let wait = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "⚠️ Transient provider error (attempt {}/{}): {}",
                        attempt + 1,
                        max_retries,
                        e
                    );
                    tracing::info!("⏳ Retrying in {:?}...", wait);
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        "❌ Error generating message (attempt {}/{}): {}",
                        attempt + 1,
                        max_retries,
                        e
                    );
                    if attempt + 1 >= max_retries {
                        tracing::error!("❌ All retry attempts exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl Generator for GenerationClient {
    fn name(&self) -> &str {
        &self.provider
    }

    async fn generate(&self, prompt: &str) -> Result<Option<String>> {
        self.generate_with_retries(prompt, self.retry.max_retries).await
    }
}

/// First `max` characters of `s`, with an ellipsis when cut.
pub(crate) fn preview(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
