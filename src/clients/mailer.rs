use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::Notifier;
use crate::config::NotifierConfig;
use crate::domain::notifications::Notification;

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: String,
    body: String,
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Delivers notifications by POSTing JSON to a mail relay.
#[derive(Clone)]
pub struct HttpMailer {
    client: Client,
    endpoint: Url,
    api_token: Option<String>,
    from_address: String,
}

impl HttpMailer {
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).context("Invalid notifier endpoint")?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("schooldesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build mail relay HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            api_token: config.api_token.clone().filter(|t| !t.is_empty()),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Notifier for HttpMailer {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let message = OutboundMessage {
            from: &self.from_address,
            to: notification.recipient(),
            subject: notification.subject(),
            body: notification.body(),
            kind: notification.kind(),
        };

        let mut request = self.client.post(self.endpoint.clone()).json(&message);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach mail relay")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Mail relay returned {status}: {body}");
        }

        debug!(kind = message.kind, "Mail relay accepted message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_endpoint() {
        let config = NotifierConfig {
            endpoint: "not a url".to_string(),
            ..NotifierConfig::default()
        };
        assert!(HttpMailer::new(&config).is_err());
    }

    #[test]
    fn empty_token_is_ignored() {
        let config = NotifierConfig {
            endpoint: "http://localhost:8025/send".to_string(),
            api_token: Some(String::new()),
            ..NotifierConfig::default()
        };
        let mailer = HttpMailer::new(&config).unwrap();
        assert!(mailer.api_token.is_none());
    }

    #[test]
    fn message_uses_type_field() {
        let n = Notification::VerificationCode {
            email: "a@example.com".to_string(),
            code: "654321".to_string(),
            expires_in_minutes: 10,
        };
        let message = OutboundMessage {
            from: "noreply@example.com",
            to: n.recipient(),
            subject: n.subject(),
            body: n.body(),
            kind: n.kind(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "verification_code");
        assert_eq!(json["to"], "a@example.com");
        assert!(json["body"].as_str().unwrap().contains("654321"));
    }
}
