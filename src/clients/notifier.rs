use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::notifications::Notification;

/// Outbound delivery channel (mail relay, SMS gateway, log sink).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log instead of delivering them. Used when the
/// mail relay is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        // Verification codes are secrets; the body is never logged.
        info!(
            event = "notification_logged",
            kind = notification.kind(),
            recipient = %notification.recipient(),
            subject = %notification.subject(),
            "Notification delivery disabled, message dropped"
        );
        Ok(())
    }
}

/// Fire-and-forget front for a [`Notifier`].
///
/// Every send runs on its own task under a timeout. Failures are logged and
/// counted; callers never see them.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    /// Queues `notification` and returns immediately.
    pub fn dispatch(&self, notification: Notification) {
        let this = self.clone();
        tokio::spawn(async move {
            this.deliver(notification).await;
        });
    }

    /// Sends `notification` and waits for the outcome, swallowing failures.
    pub async fn deliver(&self, notification: Notification) {
        let kind = notification.kind();

        let outcome = match tokio::time::timeout(self.timeout, self.notifier.send(&notification))
            .await
        {
            Ok(Ok(())) => {
                debug!(kind, "Notification delivered");
                "delivered"
            }
            Ok(Err(e)) => {
                warn!(
                    event = "notification_failed",
                    kind,
                    error = %e,
                    "Notification delivery failed"
                );
                "failed"
            }
            Err(_) => {
                warn!(
                    event = "notification_failed",
                    kind,
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "Notification delivery timed out"
                );
                "timeout"
            }
        };

        metrics::counter!("notifications_total", "kind" => kind, "outcome" => outcome)
            .increment(1);
    }
}
