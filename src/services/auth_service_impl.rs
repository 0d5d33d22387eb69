//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::validation::is_valid_email;
use crate::clients::NotificationDispatcher;
use crate::config::SecurityConfig;
use crate::db::{Account, InsertOutcome, Store, parse_timestamp, timestamp};
use crate::domain::notifications::Notification;
use crate::domain::{Principal, Role, normalize_email};
use crate::services::auth_service::{AccountInfo, AuthError, AuthService, LoginResult};
use crate::services::clock::Clock;
use crate::services::token::{SessionTokens, TokenError};

const CODE_LENGTH: usize = 6;

pub struct SeaOrmAuthService {
    store: Store,
    notifications: NotificationDispatcher,
    tokens: SessionTokens,
    clock: Arc<dyn Clock>,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(
        store: Store,
        notifications: NotificationDispatcher,
        tokens: SessionTokens,
        clock: Arc<dyn Clock>,
        security: SecurityConfig,
    ) -> Self {
        Self {
            store,
            notifications,
            tokens,
            clock,
            security,
        }
    }

    /// Stores a fresh code for `email`, replacing every earlier one, then
    /// hands it to the notifier. The code is durable before delivery starts.
    async fn issue_code(&self, email: &str) -> Result<(), AuthError> {
        let now = self.clock.now();
        let ttl_minutes = self.security.verification_code_ttl_minutes;
        let expires_at = now + chrono::Duration::minutes(ttl_minutes);
        let code = generate_code();

        self.store
            .replace_verification_code(email, &code, &timestamp(expires_at), &timestamp(now))
            .await?;

        metrics::counter!("verification_codes_issued_total").increment(1);
        info!(event = "code_issued", email = %email, expires_at = %expires_at, "Verification code issued");

        self.notifications.dispatch(Notification::VerificationCode {
            email: email.to_string(),
            code,
            expires_in_minutes: ttl_minutes,
        });

        Ok(())
    }

    fn session_for(&self, account: &Account) -> LoginResult {
        let issued = self
            .tokens
            .issue(Principal::new(account.id, account.role), self.clock.now());

        LoginResult {
            requires_verification: false,
            token: Some(issued.token),
            expires_at: Some(issued.expires_at),
            user: AccountInfo::from(account),
        }
    }
}

fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{n:06}")
}

fn is_well_formed_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn register(
        &self,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<AccountInfo, AuthError> {
        let email = normalize_email(email);

        if !role.is_self_service() {
            return Err(AuthError::Validation(format!(
                "Accounts with role '{role}' cannot be self-registered"
            )));
        }
        if !is_valid_email(&email) {
            return Err(AuthError::Validation("A valid email is required".to_string()));
        }
        if password.chars().count() < self.security.min_password_length {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                self.security.min_password_length
            )));
        }

        match self
            .store
            .create_account(&email, password, role, &self.security, self.clock.now())
            .await?
        {
            InsertOutcome::Inserted(account) => {
                info!(event = "account_registered", account_id = %account.id, role = %role, "Account registered");
                Ok(AccountInfo::from(&account))
            }
            InsertOutcome::Duplicate => Err(AuthError::EmailTaken),
        }
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AuthError> {
        let email = normalize_email(email);

        let account = if email.is_empty() || password.is_empty() {
            None
        } else {
            self.store
                .verify_account_password(&email, password, &self.security)
                .await?
        };

        let Some(account) = account else {
            metrics::counter!("auth_logins_total", "outcome" => "failed").increment(1);
            warn!(event = "login_failed", email = %email, "Login failed");
            return Err(AuthError::InvalidCredentials);
        };

        if account.role.requires_second_factor() {
            self.issue_code(&account.email).await?;

            metrics::counter!("auth_logins_total", "outcome" => "code_sent").increment(1);
            info!(event = "login_succeeded", account_id = %account.id, role = %account.role, second_factor = true, "Password accepted, verification code sent");

            return Ok(LoginResult {
                requires_verification: true,
                token: None,
                expires_at: None,
                user: AccountInfo::from(&account),
            });
        }

        metrics::counter!("auth_logins_total", "outcome" => "token_issued").increment(1);
        info!(event = "login_succeeded", account_id = %account.id, role = %account.role, second_factor = false, "Login succeeded");

        Ok(self.session_for(&account))
    }

    async fn verify_code(&self, email: &str, code: &str) -> Result<LoginResult, AuthError> {
        let email = normalize_email(email);
        let code = code.trim();

        let row = if is_well_formed_code(code) {
            self.store.find_verification_code(&email, code).await?
        } else {
            None
        };

        let Some(row) = row else {
            warn!(event = "code_rejected", email = %email, reason = "invalid", "Verification code rejected");
            return Err(AuthError::InvalidCode);
        };

        let expires_at = parse_timestamp(&row.expires_at)?;
        if self.clock.now() >= expires_at {
            self.store.consume_verification_code(row.id).await?;
            warn!(event = "code_rejected", email = %email, reason = "expired", "Verification code rejected");
            return Err(AuthError::CodeExpired);
        }

        // A concurrent verify may have spent the row between lookup and delete.
        if !self.store.consume_verification_code(row.id).await? {
            warn!(event = "code_rejected", email = %email, reason = "already_used", "Verification code rejected");
            return Err(AuthError::InvalidCode);
        }

        let account = self
            .store
            .get_account_by_email(&email)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        info!(event = "code_verified", account_id = %account.id, "Verification code accepted");

        Ok(self.session_for(&account))
    }

    async fn resend_code(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);

        let account = self
            .store
            .get_account_by_email(&email)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        self.issue_code(&account.email).await
    }

    fn authenticate(&self, token: &str) -> Result<Principal, TokenError> {
        self.tokens.verify(token, self.clock.now())
    }

    async fn current_account(&self, principal: Principal) -> Result<AccountInfo, AuthError> {
        let account = self
            .store
            .get_account(principal.account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        Ok(AccountInfo::from(&account))
    }
}
