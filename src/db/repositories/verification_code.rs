use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};

use crate::db::retry::{RetryPolicy, with_retry};
use crate::entities::{prelude::*, verification_codes};

/// Repository for the one-time login code ledger
pub struct VerificationCodeRepository {
    conn: DatabaseConnection,
    retry: RetryPolicy,
}

impl VerificationCodeRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection, retry: RetryPolicy) -> Self {
        Self { conn, retry }
    }

    /// Deletes every code issued for `email` and stores the new one, in a
    /// single transaction. Afterwards `code` is the only row for the email.
    pub async fn replace_for_email(
        &self,
        email: &str,
        code: &str,
        expires_at: &str,
        created_at: &str,
    ) -> Result<verification_codes::Model> {
        with_retry(self.retry, "replace_verification_code", || async move {
            let txn = self.conn.begin().await?;

            VerificationCodes::delete_many()
                .filter(verification_codes::Column::Email.eq(email))
                .exec(&txn)
                .await?;

            let model = verification_codes::ActiveModel {
                email: Set(email.to_string()),
                code: Set(code.to_string()),
                expires_at: Set(expires_at.to_string()),
                created_at: Set(created_at.to_string()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            txn.commit().await?;
            Ok(model)
        })
        .await
        .context("Failed to store verification code")
    }

    /// Most recently issued row for `email` carrying `code`.
    pub async fn find_latest(
        &self,
        email: &str,
        code: &str,
    ) -> Result<Option<verification_codes::Model>> {
        with_retry(self.retry, "find_verification_code", || async move {
            VerificationCodes::find()
                .filter(verification_codes::Column::Email.eq(email))
                .filter(verification_codes::Column::Code.eq(code))
                .order_by_desc(verification_codes::Column::Id)
                .one(&self.conn)
                .await
        })
        .await
        .context("Failed to query verification code")
    }

    /// Deletes a row by id. Returns true only for the caller that actually
    /// removed it, so a code cannot be spent twice.
    pub async fn consume(&self, id: i32) -> Result<bool> {
        let result = with_retry(self.retry, "consume_verification_code", || async move {
            VerificationCodes::delete_by_id(id).exec(&self.conn).await
        })
        .await
        .context("Failed to delete verification code")?;

        Ok(result.rows_affected == 1)
    }

    /// Removes every code whose expiry is at or before `now`.
    pub async fn purge_expired(&self, now: &str) -> Result<u64> {
        let result = with_retry(self.retry, "purge_verification_codes", || async move {
            VerificationCodes::delete_many()
                .filter(verification_codes::Column::ExpiresAt.lte(now))
                .exec(&self.conn)
                .await
        })
        .await
        .context("Failed to purge expired verification codes")?;

        Ok(result.rows_affected)
    }

    pub async fn count_for_email(&self, email: &str) -> Result<u64> {
        VerificationCodes::find()
            .filter(verification_codes::Column::Email.eq(email))
            .count(&self.conn)
            .await
            .context("Failed to count verification codes")
    }
}
