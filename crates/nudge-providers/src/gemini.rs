//! Direct REST `generateContent` provider (Gemini).

use nudge_core::error::{NudgeError, Result};
use serde_json::{Value, json};

use crate::client::GenerateParams;

/// A provider speaking the `generateContent` wire shape.
pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: &str, base_url: &str, client: reqwest::Client) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub async fn complete(&self, prompt: &str, params: &GenerateParams) -> Result<Option<String>> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, params.model
        );

        let body = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": params.temperature,
                "maxOutputTokens": params.max_tokens,
            }
        });

        let resp = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(params.timeout)
            .send()
            .await
            // The key travels in the query string; keep the URL out of the error.
            .map_err(|e| NudgeError::Http(format!("gemini connection failed: {}", e.without_url())))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(NudgeError::Provider(format!(
                "gemini API error {}: {}",
                status, text
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| NudgeError::Http(e.without_url().to_string()))?;

        parse_generate_content(&json)
    }
}

/// Pull `candidates[0].content.parts[0].text` out of a response body.
pub(crate) fn parse_generate_content(json: &Value) -> Result<Option<String>> {
    let parts = json["candidates"]
        .get(0)
        .and_then(|c| c["content"]["parts"].as_array())
        .ok_or_else(|| {
            tracing::error!("❌ Unexpected Gemini API response structure");
            NudgeError::Provider("Invalid response from Gemini API".into())
        })?;

    Ok(parts
        .first()
        .and_then(|p| p["text"].as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from))
}
