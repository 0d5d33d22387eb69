//! Domain service for authentication.
//!
//! Handles registration, password login with a role-dependent second factor,
//! one-time code verification and resend, and session token validation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::db::Account;
use crate::domain::{Principal, Role};
use crate::services::token::TokenError;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Verification code expired")]
    CodeExpired,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Email is already registered")]
    EmailTaken,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Account info DTO for responses.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AccountInfo {
    pub id: i32,
    pub email: String,
    pub role: Role,
}

impl From<&Account> for AccountInfo {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.value(),
            email: account.email.clone(),
            role: account.role,
        }
    }
}

/// Outcome of a login step.
///
/// After a password login for a student or leader, `requires_verification`
/// is set and no token is issued. Admin logins and successful code
/// verifications carry a token.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub requires_verification: bool,
    pub token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: AccountInfo,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates a student or leader account.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmailTaken`] if the email is already registered,
    /// [`AuthError::Validation`] for malformed input or an admin role.
    async fn register(
        &self,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<AccountInfo, AuthError>;

    /// Checks the password. Admins get a token right away; everyone else is
    /// sent a fresh verification code.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown email or a
    /// wrong password alike.
    async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Exchanges a one-time code for a session token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCode`], [`AuthError::CodeExpired`] or
    /// [`AuthError::AccountNotFound`].
    async fn verify_code(&self, email: &str, code: &str) -> Result<LoginResult, AuthError>;

    /// Replaces any outstanding code for the email with a new one.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AccountNotFound`] if no account matches.
    async fn resend_code(&self, email: &str) -> Result<(), AuthError>;

    /// Validates a bearer token and returns the principal it carries.
    fn authenticate(&self, token: &str) -> Result<Principal, TokenError>;

    /// Loads the account behind an authenticated principal.
    async fn current_account(&self, principal: Principal) -> Result<AccountInfo, AuthError>;
}
