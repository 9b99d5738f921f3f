//! Webhook delivery.
//!
//! [`WebhookDispatcher`] performs exactly one HTTP POST per card and
//! classifies the outcome into a [`DeliveryResult`]. It never returns an
//! error: transport faults and non-2xx responses are logged and recorded.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, error, info};

use crate::card::NotificationCard;
use crate::error::{ErrorKind, NotifyError, Result};
use crate::keys::mask_secret;

const JSON: &str = "application/json";

/// HTTP settings for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Timeout for establishing a connection, in seconds.
    pub connect_timeout_secs: u64,
    /// Timeout between reads of the response, in seconds.
    pub read_timeout_secs: u64,
    /// Timeout for the whole request, in seconds.
    pub timeout_secs: u64,
    /// Extra HTTP headers to include with requests.
    pub headers: BTreeMap<String, String>,
}

impl DispatcherConfig {
    /// Sets the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Sets the read timeout.
    #[must_use]
    pub const fn with_read_timeout_secs(mut self, secs: u64) -> Self {
        self.read_timeout_secs = secs;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Adds a header. `Content-Type` and `Accept` are always JSON.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            read_timeout_secs: 30,
            timeout_secs: 30,
            headers: BTreeMap::new(),
        }
    }
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    /// Whether a request was attempted.
    pub attempted: bool,
    /// Response status code, if a response was received.
    pub http_status: Option<u16>,
    /// Whether the webhook accepted the card.
    pub succeeded: bool,
    /// Failure classification.
    pub error_kind: Option<ErrorKind>,
    /// Error description or response body.
    pub message: Option<String>,
}

impl DeliveryResult {
    /// Creates a successful result.
    #[must_use]
    pub const fn delivered(status: u16) -> Self {
        Self {
            attempted: true,
            http_status: Some(status),
            succeeded: true,
            error_kind: None,
            message: None,
        }
    }

    /// Creates a failed result from an error.
    #[must_use]
    pub fn failed(err: &NotifyError) -> Self {
        let (http_status, message) = match err {
            NotifyError::RemoteRejected { status, body } => (Some(*status), body.clone()),
            other => (None, Some(other.to_string())),
        };
        Self {
            attempted: true,
            http_status,
            succeeded: false,
            error_kind: Some(err.kind()),
            message,
        }
    }
}

/// Posts cards to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
    config: DispatcherConfig,
}

impl WebhookDispatcher {
    /// Creates a dispatcher with the given HTTP settings.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Transport` if the HTTP client cannot be built.
    pub fn new(config: DispatcherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Returns the HTTP settings.
    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Sends one card. Never retries and never returns an error.
    pub async fn dispatch(&self, webhook_url: &str, card: &NotificationCard) -> DeliveryResult {
        match self.post(webhook_url, card).await {
            Ok(status) => {
                info!(
                    url = %mask_secret(webhook_url),
                    status,
                    "notification delivered"
                );
                DeliveryResult::delivered(status)
            }
            Err(err) => {
                match &err {
                    NotifyError::RemoteRejected { status, body } => error!(
                        url = %mask_secret(webhook_url),
                        status,
                        body = body.as_deref().unwrap_or("<unreadable>"),
                        "webhook rejected notification"
                    ),
                    other => error!(
                        url = %mask_secret(webhook_url),
                        error = %other,
                        "failed to send notification"
                    ),
                }
                DeliveryResult::failed(&err)
            }
        }
    }

    async fn post(&self, webhook_url: &str, card: &NotificationCard) -> Result<u16> {
        let payload = card.to_json()?;
        debug!(payload = %payload, "webhook payload");

        let mut request = self
            .client
            .post(webhook_url)
            .header(CONTENT_TYPE, JSON)
            .header(ACCEPT, JSON);
        for (key, value) in &self.config.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.body(payload).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            let body = response.text().await.ok().filter(|b| !b.is_empty());
            Err(NotifyError::RemoteRejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod config_tests {
        use super::*;

        #[test]
        fn defaults_are_bounded() {
            let config = DispatcherConfig::default();
            assert_eq!(config.connect_timeout_secs, 30);
            assert_eq!(config.read_timeout_secs, 30);
            assert_eq!(config.timeout_secs, 30);
            assert!(config.headers.is_empty());
        }

        #[test]
        fn builder_setters() {
            let config = DispatcherConfig::default()
                .with_connect_timeout_secs(5)
                .with_read_timeout_secs(8)
                .with_timeout_secs(10)
                .with_header("X-Trace", "abc");
            assert_eq!(config.connect_timeout_secs, 5);
            assert_eq!(config.read_timeout_secs, 8);
            assert_eq!(config.timeout_secs, 10);
            assert_eq!(config.headers.get("X-Trace"), Some(&"abc".to_string()));
        }

        #[test]
        fn dispatcher_keeps_config() {
            let dispatcher =
                WebhookDispatcher::new(DispatcherConfig::default().with_timeout_secs(7)).unwrap();
            assert_eq!(dispatcher.config().timeout_secs, 7);
        }
    }

    mod result_tests {
        use super::*;

        #[test]
        fn delivered_result() {
            let result = DeliveryResult::delivered(200);
            assert!(result.attempted);
            assert!(result.succeeded);
            assert_eq!(result.http_status, Some(200));
            assert!(result.error_kind.is_none());
        }

        #[test]
        fn rejected_result_keeps_status_and_body() {
            let result = DeliveryResult::failed(&NotifyError::RemoteRejected {
                status: 500,
                body: Some("internal".to_string()),
            });
            assert!(!result.succeeded);
            assert_eq!(result.http_status, Some(500));
            assert_eq!(result.error_kind, Some(ErrorKind::RemoteRejected));
            assert_eq!(result.message.as_deref(), Some("internal"));
        }

        #[test]
        fn transport_result_has_no_status() {
            let result =
                DeliveryResult::failed(&NotifyError::Transport("connection refused".to_string()));
            assert!(!result.succeeded);
            assert!(result.http_status.is_none());
            assert_eq!(result.error_kind, Some(ErrorKind::TransportError));
        }
    }

    #[tokio::test]
    async fn malformed_url_is_a_transport_failure() {
        let dispatcher = WebhookDispatcher::new(DispatcherConfig::default()).unwrap();
        let card = crate::card::build(&crate::types::AnalysisOutcome::new("P", "p"), "", "", "");
        let result = dispatcher.dispatch("not a url", &card).await;
        assert!(result.attempted);
        assert!(!result.succeeded);
        assert_eq!(result.error_kind, Some(ErrorKind::TransportError));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_failure() {
        let dispatcher = WebhookDispatcher::new(
            DispatcherConfig::default()
                .with_connect_timeout_secs(2)
                .with_timeout_secs(2),
        )
        .unwrap();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let card = crate::card::build(&crate::types::AnalysisOutcome::new("P", "p"), "", "", "");
        let result = dispatcher
            .dispatch(&format!("http://127.0.0.1:{port}/hook"), &card)
            .await;
        assert!(!result.succeeded);
        assert_eq!(result.error_kind, Some(ErrorKind::TransportError));
    }
}
