//! Shared fixtures for integration tests.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use schooldesk::clients::{NotificationDispatcher, Notifier};
use schooldesk::config::Config;
use schooldesk::db::{Account, InsertOutcome, School, Store};
use schooldesk::domain::notifications::Notification;
use schooldesk::domain::{Principal, Role};
use schooldesk::models::ApplicationDetails;
use schooldesk::services::{Clock, ManualClock};
use schooldesk::state::SharedState;

pub const PASSWORD: &str = "correct-horse-battery";

/// Captures every notification. Optionally fails every send after recording.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn codes_for(&self, email: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|n| match n {
                Notification::VerificationCode { email: to, code, .. } if to == email => Some(code),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.fail {
            anyhow::bail!("mail relay unavailable");
        }
        Ok(())
    }
}

pub struct TestApp {
    pub state: SharedState,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
}

pub fn temp_db_url(prefix: &str) -> String {
    let db_path = std::env::temp_dir().join(format!("{prefix}-{}.db", uuid::Uuid::new_v4()));
    format!("sqlite:{}", db_path.display())
}

pub async fn spawn_with(notifier: RecordingNotifier) -> TestApp {
    let mut config = Config::default();
    config.general.database_path = temp_db_url("schooldesk-test");
    config.security.token_secret = "integration-test-secret".to_string();
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.scheduler.enabled = false;

    let store = Store::from_config(&config)
        .await
        .expect("Failed to open test database");

    let notifier = Arc::new(notifier);
    // Stored timestamps and token expiry have millisecond precision.
    let start = DateTime::from_timestamp_millis(Utc::now().timestamp_millis())
        .expect("current time is representable");
    let clock = Arc::new(ManualClock::new(start));
    let dispatcher = NotificationDispatcher::new(notifier.clone(), Duration::from_secs(2));

    let state = SharedState::from_parts(config, store, dispatcher, clock.clone())
        .expect("Failed to build shared state");

    TestApp {
        state,
        notifier,
        clock,
    }
}

pub async fn spawn() -> TestApp {
    spawn_with(RecordingNotifier::default()).await
}

impl TestApp {
    pub fn store(&self) -> &Store {
        &self.state.store
    }

    pub async fn account(&self, email: &str, role: Role) -> Account {
        match self
            .state
            .store
            .create_account(
                email,
                PASSWORD,
                role,
                &self.state.config.security,
                self.clock.now(),
            )
            .await
            .expect("Failed to create account")
        {
            InsertOutcome::Inserted(account) => account,
            InsertOutcome::Duplicate => panic!("account {email} already exists"),
        }
    }

    pub async fn principal(&self, email: &str, role: Role) -> Principal {
        let account = self.account(email, role).await;
        Principal::new(account.id, account.role)
    }

    pub async fn school(&self, name: &str, leader: &Principal) -> School {
        self.state
            .store
            .create_school(name, leader.account_id)
            .await
            .expect("Failed to create school")
    }

    /// Waits for the `n`-th verification code sent to `email` (1-based).
    pub async fn nth_code(&self, email: &str, n: usize) -> String {
        for _ in 0..200 {
            if let Some(code) = self.notifier.codes_for(email).get(n - 1) {
                return code.clone();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no verification code #{n} was sent to {email}");
    }

    /// Waits until `pred` holds for the recorded notifications.
    pub async fn wait_for_notification(&self, pred: impl Fn(&Notification) -> bool) -> Notification {
        for _ in 0..200 {
            if let Some(n) = self.notifier.sent().into_iter().find(|n| pred(n)) {
                return n;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected notification was never sent");
    }
}

pub fn details(name: &str) -> ApplicationDetails {
    ApplicationDetails {
        student_name: name.to_string(),
        email: format!("{}@family.example", name.to_lowercase().replace(' ', ".")),
        phone: Some("555-0100".to_string()),
        guardian_name: Some("Pat Guardian".to_string()),
        guardian_phone: None,
        current_grade: Some("8".to_string()),
        applying_grade: Some("9".to_string()),
        notes: None,
    }
}
