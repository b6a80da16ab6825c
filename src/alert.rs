//! Alert delivery.
//!
//! An [`AlertSink`] takes a text message and reports how delivery went. It
//! never returns an error and never retries: failures are logged and the
//! caller carries on.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::AlertConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertOutcome {
    Delivered,
    /// Non-200 status, or `None` when no response was received.
    Failed(Option<u16>),
    /// No webhook configured; the message was only logged.
    Skipped,
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, message: &str) -> AlertOutcome;
}

/// Posts `{"text": message}` to an incoming-webhook URL (Slack format).
pub struct WebhookSink {
    http: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    async fn send(&self, message: &str) -> AlertOutcome {
        let body = serde_json::json!({ "text": message });
        match self.http.post(&self.url).json(&body).send().await {
            Ok(resp) if resp.status().as_u16() == 200 => {
                tracing::info!(status = 200, "alert sent");
                AlertOutcome::Delivered
            }
            Ok(resp) => {
                let status = resp.status().as_u16();
                tracing::warn!(status, "failed to send alert");
                AlertOutcome::Failed(Some(status))
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to send alert");
                AlertOutcome::Failed(None)
            }
        }
    }
}

/// Used when no webhook is configured.
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn send(&self, message: &str) -> AlertOutcome {
        tracing::warn!(message, "alert (no webhook configured)");
        AlertOutcome::Skipped
    }
}

/// Picks the sink for the given config.
pub fn create_sink(config: &AlertConfig) -> Box<dyn AlertSink> {
    match config.resolved_webhook_url() {
        Some(url) => Box::new(WebhookSink::new(url)),
        None => {
            tracing::warn!(
                var = %config.webhook_url_env,
                "no alert webhook configured; alerts will only be logged"
            );
            Box::new(LogSink)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn delivered_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({ "text": "hello" })))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let sink = WebhookSink::new(server.uri());
        assert_eq!(sink.send("hello").await, AlertOutcome::Delivered);
    }

    #[tokio::test]
    async fn failure_status_is_reported_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let sink = WebhookSink::new(server.uri());
        assert_eq!(sink.send("hello").await, AlertOutcome::Failed(Some(403)));
    }

    #[tokio::test]
    async fn unreachable_webhook_is_failed() {
        let sink = WebhookSink::new("http://127.0.0.1:9/hook");
        assert_eq!(sink.send("hello").await, AlertOutcome::Failed(None));
    }

    #[tokio::test]
    async fn missing_url_falls_back_to_log_sink() {
        let sink = create_sink(&AlertConfig {
            webhook_url: None,
            webhook_url_env: "ZEC_TEST_UNSET_ALERT_VAR".to_string(),
        });
        assert_eq!(sink.send("hello").await, AlertOutcome::Skipped);
    }
}
