pub mod mailer;
pub mod notifier;

pub use mailer::HttpMailer;
pub use notifier::{LogNotifier, NotificationDispatcher, Notifier};

use std::sync::Arc;
use std::time::Duration;

use crate::config::NotifierConfig;

/// Builds the dispatcher for the configured delivery channel.
pub fn build_dispatcher(config: &NotifierConfig) -> anyhow::Result<NotificationDispatcher> {
    let notifier: Arc<dyn Notifier> = if config.enabled {
        Arc::new(HttpMailer::new(config)?)
    } else {
        Arc::new(LogNotifier)
    };

    Ok(NotificationDispatcher::new(
        notifier,
        Duration::from_secs(config.timeout_seconds.max(1)),
    ))
}
