use crate::config::{Config, SecurityConfig};
use crate::domain::{AccountId, ApplicationId, ApplicationStatus, Role, SchoolId};
use crate::entities::verification_codes;
use crate::models::{Application, ApplicationDetails, StatusChange};
use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;
pub mod retry;

pub use repositories::account::Account;
pub use repositories::school::School;
pub use retry::RetryPolicy;

/// Result of an insert guarded by a unique constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome<T> {
    Inserted(T),
    Duplicate,
}

/// Canonical timestamp format for stored columns. Fixed width and always UTC,
/// so string comparison in SQL matches chronological order.
#[must_use]
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .map_err(|e| anyhow::anyhow!("Invalid stored timestamp '{value}': {e}"))?
        .with_timezone(&Utc))
}

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
    retry: RetryPolicy,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1, RetryPolicy::default()).await
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
            RetryPolicy::new(
                config.general.storage_retry_attempts,
                config.general.storage_retry_backoff_ms,
            ),
        )
        .await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
        retry: RetryPolicy,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn, retry })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn account_repo(&self) -> repositories::account::AccountRepository {
        repositories::account::AccountRepository::new(self.conn.clone(), self.retry)
    }

    fn school_repo(&self) -> repositories::school::SchoolRepository {
        repositories::school::SchoolRepository::new(self.conn.clone(), self.retry)
    }

    fn code_repo(&self) -> repositories::verification_code::VerificationCodeRepository {
        repositories::verification_code::VerificationCodeRepository::new(
            self.conn.clone(),
            self.retry,
        )
    }

    fn application_repo(&self) -> repositories::application::ApplicationRepository {
        repositories::application::ApplicationRepository::new(self.conn.clone(), self.retry)
    }

    // Credential store

    pub async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.account_repo().get_by_email(email).await
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        self.account_repo().get_by_id(id).await
    }

    pub async fn verify_account_password(
        &self,
        email: &str,
        password: &str,
        security: &SecurityConfig,
    ) -> Result<Option<Account>> {
        self.account_repo()
            .verify_password(email, password, security)
            .await
    }

    pub async fn create_account(
        &self,
        email: &str,
        password: &str,
        role: Role,
        security: &SecurityConfig,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome<Account>> {
        self.account_repo()
            .create(email, password, role, security, now)
            .await
    }

    // Schools

    pub async fn get_school(&self, id: SchoolId) -> Result<Option<School>> {
        self.school_repo().get(id).await
    }

    pub async fn create_school(&self, name: &str, leader_id: AccountId) -> Result<School> {
        self.school_repo().create(name, leader_id).await
    }

    pub async fn list_schools_for_leader(&self, leader_id: AccountId) -> Result<Vec<School>> {
        self.school_repo().list_for_leader(leader_id).await
    }

    // Verification code ledger

    pub async fn replace_verification_code(
        &self,
        email: &str,
        code: &str,
        expires_at: &str,
        created_at: &str,
    ) -> Result<verification_codes::Model> {
        self.code_repo()
            .replace_for_email(email, code, expires_at, created_at)
            .await
    }

    pub async fn find_verification_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<Option<verification_codes::Model>> {
        self.code_repo().find_latest(email, code).await
    }

    pub async fn consume_verification_code(&self, id: i32) -> Result<bool> {
        self.code_repo().consume(id).await
    }

    pub async fn purge_expired_verification_codes(&self, now: &str) -> Result<u64> {
        self.code_repo().purge_expired(now).await
    }

    pub async fn count_verification_codes(&self, email: &str) -> Result<u64> {
        self.code_repo().count_for_email(email).await
    }

    // Application store

    pub async fn insert_application(
        &self,
        applicant_id: AccountId,
        school_id: SchoolId,
        details: &ApplicationDetails,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome<Application>> {
        self.application_repo()
            .insert(applicant_id, school_id, details, now)
            .await
    }

    pub async fn get_application(&self, id: ApplicationId) -> Result<Option<Application>> {
        self.application_repo().get(id).await
    }

    pub async fn find_duplicate_application(
        &self,
        applicant_id: AccountId,
        school_id: SchoolId,
    ) -> Result<Option<Application>> {
        self.application_repo()
            .find_duplicate(applicant_id, school_id)
            .await
    }

    pub async fn update_application_status(
        &self,
        id: ApplicationId,
        expected: ApplicationStatus,
        change: &StatusChange,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.application_repo()
            .update_status(id, expected, change, now)
            .await
    }

    pub async fn update_application_details(
        &self,
        id: ApplicationId,
        details: &ApplicationDetails,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.application_repo()
            .update_details(id, details, now)
            .await
    }

    pub async fn list_applications_for_applicant(
        &self,
        applicant_id: AccountId,
    ) -> Result<Vec<Application>> {
        self.application_repo()
            .list_for_applicant(applicant_id)
            .await
    }

    pub async fn list_applications_for_schools(
        &self,
        school_ids: &[SchoolId],
    ) -> Result<Vec<Application>> {
        self.application_repo().list_for_schools(school_ids).await
    }

    pub async fn list_all_applications(&self) -> Result<Vec<Application>> {
        self.application_repo().list_all().await
    }
}
