//! OpenAI-compatible chat completions.
//!
//! Handles every provider that speaks `POST {base}/chat/completions`
//! (OpenAI, Groq, OpenRouter, Ollama). Providers differ only by endpoint URL,
//! auth style and API key.

use nudge_core::error::{NudgeError, Result};
use serde_json::{Value, json};

use crate::client::GenerateParams;
use crate::provider_registry::AuthStyle;

/// A provider speaking the chat-completions wire shape.
pub struct OpenAiCompatibleProvider {
    /// Provider name (e.g., "openai", "groq").
    name: String,
    api_key: String,
    /// Base URL for the API (e.g., "https://api.openai.com/v1").
    base_url: String,
    auth_style: AuthStyle,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        name: &str,
        api_key: &str,
        base_url: &str,
        auth_style: AuthStyle,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.to_string(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_style,
            client,
        }
    }

    /// Build the auth header for the request.
    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_style {
            AuthStyle::Bearer if !self.api_key.is_empty() => {
                req.header("Authorization", format!("Bearer {}", self.api_key))
            }
            _ => req,
        }
    }

    /// One chat completion request. Returns the raw assistant text.
    pub async fn complete(&self, prompt: &str, params: &GenerateParams) -> Result<Option<String>> {
        let body = json!({
            "model": params.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(params.timeout);
        let req = self.apply_auth(req);

        let resp = req.send().await.map_err(|e| {
            NudgeError::Http(format!("{} connection failed ({}): {}", self.name, url, e))
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(NudgeError::Provider(format!(
                "{} API error {}: {}",
                self.name, status, text
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| NudgeError::Http(e.to_string()))?;

        parse_chat_response(&json)
    }
}

/// Pull `choices[0].message.content` out of a chat completion body.
pub(crate) fn parse_chat_response(json: &Value) -> Result<Option<String>> {
    let choice = json["choices"]
        .get(0)
        .ok_or_else(|| NudgeError::Provider("No choices in response".into()))?;

    Ok(choice["message"]["content"]
        .as_str()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from))
}
