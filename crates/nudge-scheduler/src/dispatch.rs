//! Webhook dispatch: delivers reminders and operator notifications.
//! Body is `{"content": text}`; any 2xx is success.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nudge_core::config::NudgeConfig;
use nudge_core::error::{NudgeError, Result};
use nudge_core::traits::Transport;

use crate::notify::{Notification, NotifyLevel};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP webhook endpoint (Discord-style).
pub struct WebhookTransport {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl WebhookTransport {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, content: &str) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(NudgeError::Transport(format!("{} webhook URL not configured", self.name)));
        }

        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "content": content }))
            .timeout(WEBHOOK_TIMEOUT)
            .send()
            .await
            .map_err(|e| NudgeError::Transport(format!("{} webhook send failed: {e}", self.name)))?;

        if resp.status().is_success() {
            tracing::info!("✅ Message sent to {} webhook", self.name);
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(NudgeError::Transport(format!(
                "{} webhook error {status}: {body}",
                self.name
            )))
        }
    }
}

/// Operator channel for problems the loop survives.
///
/// Reports below the threshold, or with no endpoint configured, are dropped.
/// Delivery failures are logged and never returned.
#[derive(Clone)]
pub struct DebugChannel {
    transport: Option<Arc<dyn Transport>>,
    threshold: NotifyLevel,
}

impl DebugChannel {
    pub fn new(transport: Option<Arc<dyn Transport>>, threshold: NotifyLevel) -> Self {
        Self { transport, threshold }
    }

    /// A channel that drops everything.
    pub fn disabled() -> Self {
        Self::new(None, NotifyLevel::Error)
    }

    pub fn from_config(config: &NudgeConfig) -> Self {
        let threshold = NotifyLevel::parse_or_error(&config.webhook.debug_level);
        let transport = config
            .debug_url()
            .map(|url| Arc::new(WebhookTransport::new("debug", url)) as Arc<dyn Transport>);
        Self::new(transport, threshold)
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Send `body` at `level`. Returns whether it was delivered.
    pub async fn report(&self, level: NotifyLevel, body: &str) -> bool {
        self.deliver(Notification::new(level, body)).await
    }

    /// Error report with the error text in a fenced block.
    pub async fn report_error(&self, context: &str, error: Option<&dyn fmt::Display>) -> bool {
        self.deliver(Notification::error(context, error)).await
    }

    async fn deliver(&self, notification: Notification) -> bool {
        let Some(transport) = &self.transport else {
            tracing::debug!("Debug webhook not configured, skipping debug message");
            return false;
        };
        if notification.level < self.threshold {
            tracing::debug!(
                "Debug message level {} below threshold {}, skipping",
                notification.level,
                self.threshold
            );
            return false;
        }

        match transport.send(&notification.render()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("❌ Failed to deliver debug message: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_webhook_posts_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json(serde_json::json!({"content": "Read a chapter today!"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let transport = WebhookTransport::new("main", &format!("{}/hook", server.uri()));
        transport.send("Read a chapter today!").await.unwrap();
    }

    #[tokio::test]
    async fn test_webhook_non_success_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let transport = WebhookTransport::new("main", &server.uri());
        let err = transport.send("hello").await.unwrap_err();
        assert!(matches!(err, NudgeError::Transport(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_webhook_unreachable_is_error() {
        let transport = WebhookTransport::new("main", "http://127.0.0.1:9/hook");
        assert!(matches!(
            transport.send("hello").await,
            Err(NudgeError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_webhook_empty_url_is_error() {
        let transport = WebhookTransport::new("main", "");
        assert!(transport.send("hello").await.is_err());
    }

    #[tokio::test]
    async fn test_debug_channel_threshold() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let transport: Arc<dyn Transport> = Arc::new(WebhookTransport::new("debug", &server.uri()));
        let channel = DebugChannel::new(Some(transport), NotifyLevel::Warning);

        assert!(!channel.report(NotifyLevel::Info, "below threshold").await);
        assert!(channel.report(NotifyLevel::Warning, "at threshold").await);
        assert!(channel.report_error("cache is empty", None).await);
    }

    #[tokio::test]
    async fn test_debug_channel_message_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let transport: Arc<dyn Transport> = Arc::new(WebhookTransport::new("debug", &server.uri()));
        let channel = DebugChannel::new(Some(transport), NotifyLevel::Debug);
        let err = NudgeError::Provider("model overloaded".into());
        assert!(channel.report_error("Generation failed", Some(&err)).await);

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let content = body["content"].as_str().unwrap();
        assert!(content.starts_with('['));
        assert!(content.contains("] **ERROR**: Generation failed\n```\nprovider error: model overloaded\n```"));
    }

    #[tokio::test]
    async fn test_debug_channel_disabled_or_failing() {
        assert!(!DebugChannel::disabled().report_error("nobody listens", None).await);

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let transport: Arc<dyn Transport> = Arc::new(WebhookTransport::new("debug", &server.uri()));
        let channel = DebugChannel::new(Some(transport), NotifyLevel::Debug);
        assert!(!channel.report(NotifyLevel::Error, "lost").await);
    }

    #[test]
    fn test_from_config() {
        let mut config = NudgeConfig::default();
        assert!(!DebugChannel::from_config(&config).is_enabled());

        config.webhook.debug_url = Some("YOUR_DEBUG_WEBHOOK_URL_HERE".into());
        assert!(!DebugChannel::from_config(&config).is_enabled());

        config.webhook.debug_url = Some("https://example.invalid/hook".into());
        config.webhook.debug_level = "info".into();
        let channel = DebugChannel::from_config(&config);
        assert!(channel.is_enabled());
        assert_eq!(channel.threshold, NotifyLevel::Info);
    }
}
