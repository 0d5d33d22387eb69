use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Serialize;
use tokio::task;

use crate::config::SecurityConfig;
use crate::db::retry::{RetryPolicy, is_unique_violation, with_retry};
use crate::db::{InsertOutcome, timestamp};
use crate::domain::{AccountId, Role};
use crate::entities::{accounts, prelude::*};

/// Account data returned from the repository (without the password hash)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub role: Role,
    pub created_at: String,
    pub updated_at: String,
}

impl From<accounts::Model> for Account {
    fn from(model: accounts::Model) -> Self {
        Self {
            id: AccountId::new(model.id),
            email: model.email,
            role: model.role,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub struct AccountRepository {
    conn: DatabaseConnection,
    retry: RetryPolicy,
}

impl AccountRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection, retry: RetryPolicy) -> Self {
        Self { conn, retry }
    }

    /// Get account by (already normalized) email
    pub async fn get_by_email(&self, email: &str) -> Result<Option<Account>> {
        let account = self
            .find_model_by_email(email)
            .await
            .context("Failed to query account by email")?;

        Ok(account.map(Account::from))
    }

    pub async fn get_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        let account = with_retry(self.retry, "get_account", || async move {
            Accounts::find_by_id(id.value()).one(&self.conn).await
        })
        .await
        .context("Failed to query account by ID")?;

        Ok(account.map(Account::from))
    }

    async fn find_model_by_email(
        &self,
        email: &str,
    ) -> Result<Option<accounts::Model>, sea_orm::DbErr> {
        with_retry(self.retry, "get_account_by_email", || async move {
            Accounts::find()
                .filter(accounts::Column::Email.eq(email))
                .one(&self.conn)
                .await
        })
        .await
    }

    /// Checks a password and returns the account when it matches.
    /// A missing account and a wrong password both yield `None`, and both
    /// run one Argon2 computation with the configured cost.
    /// Note: This uses `spawn_blocking` because Argon2 hashing is CPU-intensive
    /// and would block the async runtime if run directly.
    pub async fn verify_password(
        &self,
        email: &str,
        password: &str,
        security: &SecurityConfig,
    ) -> Result<Option<Account>> {
        let account = self
            .find_model_by_email(email)
            .await
            .context("Failed to query account for password verification")?;

        let Some(account) = account else {
            // Unknown email: hash the candidate anyway so the miss costs the
            // same as a wrong password.
            let password = password.to_string();
            let security = security.clone();
            task::spawn_blocking(move || hash_password(&password, Some(&security)))
                .await
                .context("Password hashing task panicked")??;
            return Ok(None);
        };

        let password_hash = account.password_hash.clone();
        let password = password.to_string();

        let is_valid = task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&password_hash)
                .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

            Ok::<bool, anyhow::Error>(
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed_hash)
                    .is_ok(),
            )
        })
        .await
        .context("Password verification task panicked")??;

        Ok(is_valid.then(|| Account::from(account)))
    }

    /// Hashes the password and inserts a new account.
    pub async fn create(
        &self,
        email: &str,
        password: &str,
        role: Role,
        security: &SecurityConfig,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome<Account>> {
        let password = password.to_string();
        let security = security.clone();
        let password_hash = task::spawn_blocking(move || hash_password(&password, Some(&security)))
            .await
            .context("Password hashing task panicked")??;

        let now = timestamp(now);
        let inserted = with_retry(self.retry, "create_account", || {
            let model = accounts::ActiveModel {
                email: Set(email.to_string()),
                password_hash: Set(password_hash.clone()),
                role: Set(role),
                created_at: Set(now.clone()),
                updated_at: Set(now.clone()),
                ..Default::default()
            };
            let conn = &self.conn;
            async move { model.insert(conn).await }
        })
        .await;

        match inserted {
            Ok(model) => Ok(InsertOutcome::Inserted(Account::from(model))),
            Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(e).context("Failed to insert account"),
        }
    }
}

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses the argon2 crate defaults.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_salted_and_verifiable() {
        let cfg = SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..SecurityConfig::default()
        };
        let a = hash_password("correct horse", Some(&cfg)).unwrap();
        let b = hash_password("correct horse", Some(&cfg)).unwrap();
        assert_ne!(a, b);

        let parsed = PasswordHash::new(&a).unwrap();
        assert!(
            Argon2::default()
                .verify_password(b"correct horse", &parsed)
                .is_ok()
        );
        assert!(
            Argon2::default()
                .verify_password(b"wrong horse", &parsed)
                .is_err()
        );
    }

    #[tokio::test]
    async fn email_lookup_retries_transient_failures() {
        use sea_orm::{DatabaseBackend, DbErr, MockDatabase, RuntimeErr};

        let row = accounts::Model {
            id: 4,
            email: "ada@student.example".to_string(),
            password_hash: "unused".to_string(),
            role: Role::Student,
            created_at: "2026-03-01T09:00:00.000Z".to_string(),
            updated_at: "2026-03-01T09:00:00.000Z".to_string(),
        };
        let conn = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_errors([DbErr::Conn(RuntimeErr::Internal(
                "connection reset".to_string(),
            ))])
            .append_query_results([vec![row]])
            .into_connection();

        let repo = AccountRepository::new(conn, RetryPolicy::new(3, 1));
        let account = repo
            .get_by_email("ada@student.example")
            .await
            .unwrap()
            .expect("account after retry");
        assert_eq!(account.id, AccountId::new(4));
    }
}
