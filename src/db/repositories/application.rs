use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::db::retry::{RetryPolicy, is_unique_violation, with_retry};
use crate::db::{InsertOutcome, timestamp};
use crate::domain::{AccountId, ApplicationId, ApplicationStatus, SchoolId};
use crate::entities::{applications, prelude::*};
use crate::models::{Application, ApplicationDetails, StatusChange};

/// Repository for applications. Status only ever changes through
/// [`ApplicationRepository::update_status`], which is conditional on the
/// current status.
pub struct ApplicationRepository {
    conn: DatabaseConnection,
    retry: RetryPolicy,
}

impl ApplicationRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection, retry: RetryPolicy) -> Self {
        Self { conn, retry }
    }

    /// Inserts a pending application. The unique (applicant, school) index
    /// turns a concurrent duplicate into [`InsertOutcome::Duplicate`].
    pub async fn insert(
        &self,
        applicant_id: AccountId,
        school_id: SchoolId,
        details: &ApplicationDetails,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome<Application>> {
        let now = timestamp(now);

        let inserted = with_retry(self.retry, "insert_application", || {
            let model = applications::ActiveModel {
                applicant_id: Set(applicant_id.value()),
                school_id: Set(school_id.value()),
                student_name: Set(details.student_name.clone()),
                email: Set(details.email.clone()),
                phone: Set(details.phone.clone()),
                guardian_name: Set(details.guardian_name.clone()),
                guardian_phone: Set(details.guardian_phone.clone()),
                current_grade: Set(details.current_grade.clone()),
                applying_grade: Set(details.applying_grade.clone()),
                notes: Set(details.notes.clone()),
                status: Set(ApplicationStatus::Pending),
                rejection_reason: Set(None),
                reviewer_id: Set(None),
                reviewed_at: Set(None),
                created_at: Set(now.clone()),
                updated_at: Set(now.clone()),
                ..Default::default()
            };
            let conn = &self.conn;
            async move { model.insert(conn).await }
        })
        .await;

        match inserted {
            Ok(model) => Ok(InsertOutcome::Inserted(Application::from(model))),
            Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(e).context("Failed to insert application"),
        }
    }

    pub async fn get(&self, id: ApplicationId) -> Result<Option<Application>> {
        let row = with_retry(self.retry, "get_application", || async move {
            Applications::find_by_id(id.value()).one(&self.conn).await
        })
        .await
        .context("Failed to query application")?;

        Ok(row.map(Application::from))
    }

    /// Any application for the pair, whatever its status.
    pub async fn find_duplicate(
        &self,
        applicant_id: AccountId,
        school_id: SchoolId,
    ) -> Result<Option<Application>> {
        let row = with_retry(self.retry, "find_duplicate_application", || async move {
            Applications::find()
                .filter(applications::Column::ApplicantId.eq(applicant_id.value()))
                .filter(applications::Column::SchoolId.eq(school_id.value()))
                .one(&self.conn)
                .await
        })
        .await
        .context("Failed to query application by applicant and school")?;

        Ok(row.map(Application::from))
    }

    /// `UPDATE ... WHERE id = ? AND status = expected`. Returns false when the
    /// row was missing or had already left `expected`.
    pub async fn update_status(
        &self,
        id: ApplicationId,
        expected: ApplicationStatus,
        change: &StatusChange,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let now = timestamp(now);
        let reviewed_at = change.reviewer_id.map(|_| now.clone());

        let result = with_retry(self.retry, "update_application_status", || {
            let update = applications::ActiveModel {
                status: Set(change.status),
                rejection_reason: Set(change.rejection_reason.clone()),
                reviewer_id: Set(change.reviewer_id.map(|r| r.value())),
                reviewed_at: Set(reviewed_at.clone()),
                updated_at: Set(now.clone()),
                ..Default::default()
            };
            let conn = &self.conn;
            async move {
                Applications::update_many()
                    .set(update)
                    .filter(applications::Column::Id.eq(id.value()))
                    .filter(applications::Column::Status.eq(expected))
                    .exec(conn)
                    .await
            }
        })
        .await
        .context("Failed to update application status")?;

        Ok(result.rows_affected == 1)
    }

    /// Replaces the applicant snapshot while the application is still pending.
    pub async fn update_details(
        &self,
        id: ApplicationId,
        details: &ApplicationDetails,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let now = timestamp(now);

        let result = with_retry(self.retry, "update_application_details", || {
            let update = applications::ActiveModel {
                student_name: Set(details.student_name.clone()),
                email: Set(details.email.clone()),
                phone: Set(details.phone.clone()),
                guardian_name: Set(details.guardian_name.clone()),
                guardian_phone: Set(details.guardian_phone.clone()),
                current_grade: Set(details.current_grade.clone()),
                applying_grade: Set(details.applying_grade.clone()),
                notes: Set(details.notes.clone()),
                updated_at: Set(now.clone()),
                ..Default::default()
            };
            let conn = &self.conn;
            async move {
                Applications::update_many()
                    .set(update)
                    .filter(applications::Column::Id.eq(id.value()))
                    .filter(applications::Column::Status.eq(ApplicationStatus::Pending))
                    .exec(conn)
                    .await
            }
        })
        .await
        .context("Failed to update application details")?;

        Ok(result.rows_affected == 1)
    }

    pub async fn list_for_applicant(&self, applicant_id: AccountId) -> Result<Vec<Application>> {
        let rows = with_retry(self.retry, "list_applications_for_applicant", || async move {
            Applications::find()
                .filter(applications::Column::ApplicantId.eq(applicant_id.value()))
                .order_by_desc(applications::Column::Id)
                .all(&self.conn)
                .await
        })
        .await
        .context("Failed to list applications for applicant")?;

        Ok(rows.into_iter().map(Application::from).collect())
    }

    pub async fn list_for_schools(&self, school_ids: &[SchoolId]) -> Result<Vec<Application>> {
        if school_ids.is_empty() {
            return Ok(vec![]);
        }

        let rows = with_retry(self.retry, "list_applications_for_schools", || async move {
            Applications::find()
                .filter(applications::Column::SchoolId.is_in(school_ids.iter().map(|s| s.value())))
                .order_by_desc(applications::Column::Id)
                .all(&self.conn)
                .await
        })
        .await
        .context("Failed to list applications for schools")?;

        Ok(rows.into_iter().map(Application::from).collect())
    }

    pub async fn list_all(&self) -> Result<Vec<Application>> {
        let rows = with_retry(self.retry, "list_applications", || async move {
            Applications::find()
                .order_by_desc(applications::Column::Id)
                .all(&self.conn)
                .await
        })
        .await
        .context("Failed to list applications")?;

        Ok(rows.into_iter().map(Application::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, RuntimeErr};

    fn row(id: i32) -> applications::Model {
        applications::Model {
            id,
            applicant_id: 7,
            school_id: 3,
            student_name: "Ada Lovelace".to_string(),
            email: "ada@family.example".to_string(),
            phone: None,
            guardian_name: None,
            guardian_phone: None,
            current_grade: None,
            applying_grade: None,
            notes: None,
            status: ApplicationStatus::Pending,
            rejection_reason: None,
            reviewer_id: None,
            reviewed_at: None,
            created_at: "2026-03-01T09:00:00.000Z".to_string(),
            updated_at: "2026-03-01T09:00:00.000Z".to_string(),
        }
    }

    fn lost_connection() -> DbErr {
        DbErr::Conn(RuntimeErr::Internal("connection reset".to_string()))
    }

    #[tokio::test]
    async fn read_paths_retry_transient_failures() {
        let conn = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_errors([lost_connection()])
            .append_query_results([vec![row(1)]])
            .append_query_errors([lost_connection()])
            .append_query_results([vec![row(2), row(1)]])
            .into_connection();
        let repo = ApplicationRepository::new(conn, RetryPolicy::new(3, 1));

        let duplicate = repo
            .find_duplicate(AccountId::new(7), SchoolId::new(3))
            .await
            .unwrap();
        assert_eq!(duplicate.map(|a| a.id), Some(ApplicationId::new(1)));

        let listed = repo.list_for_applicant(AccountId::new(7)).await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn permanent_read_failure_is_not_retried() {
        let conn = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_errors([DbErr::Custom("no such table".to_string())])
            .append_query_results([vec![row(1)]])
            .into_connection();
        let repo = ApplicationRepository::new(conn, RetryPolicy::new(3, 1));

        assert!(repo.list_all().await.is_err());
    }
}
