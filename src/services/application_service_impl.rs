//! `SeaORM` implementation of the `ApplicationService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::NotificationDispatcher;
use crate::db::{InsertOutcome, School, Store};
use crate::domain::notifications::Notification;
use crate::domain::{ApplicationId, ApplicationStatus, Principal, Role, SchoolId};
use crate::models::{Application, ApplicationDetails, StatusChange};
use crate::services::access::{require_account, require_reviewer, require_role};
use crate::services::application_service::{ApplicationError, ApplicationService};
use crate::services::clock::Clock;

pub struct SeaOrmApplicationService {
    store: Store,
    notifications: NotificationDispatcher,
    clock: Arc<dyn Clock>,
}

fn ensure_transition(
    from: ApplicationStatus,
    to: ApplicationStatus,
) -> Result<(), ApplicationError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ApplicationError::InvalidTransition { from, to })
    }
}

impl SeaOrmApplicationService {
    #[must_use]
    pub fn new(store: Store, notifications: NotificationDispatcher, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            notifications,
            clock,
        }
    }

    async fn load(&self, id: ApplicationId) -> Result<Application, ApplicationError> {
        self.store
            .get_application(id)
            .await?
            .ok_or(ApplicationError::NotFound)
    }

    async fn school_of(&self, application: &Application) -> Result<School, ApplicationError> {
        self.store
            .get_school(application.school_id)
            .await?
            .ok_or(ApplicationError::SchoolNotFound)
    }

    /// Applies `change` only if the row is still pending. A zero-row update
    /// means another caller moved it first.
    async fn transition(
        &self,
        application: &Application,
        change: &StatusChange,
    ) -> Result<Application, ApplicationError> {
        let applied = self
            .store
            .update_application_status(
                application.id,
                ApplicationStatus::Pending,
                change,
                self.clock.now(),
            )
            .await?;

        if !applied {
            let current = self
                .store
                .get_application(application.id)
                .await?
                .map_or(application.status, |a| a.status);
            warn!(
                event = "transition_conflict",
                application_id = %application.id,
                current = %current,
                requested = %change.status,
                "Application changed concurrently"
            );
            return Err(ApplicationError::InvalidTransition {
                from: current,
                to: change.status,
            });
        }

        metrics::counter!("application_transitions_total", "status" => change.status.as_str())
            .increment(1);
        info!(
            event = "application_transitioned",
            application_id = %application.id,
            from = %application.status,
            to = %change.status,
            reviewer_id = ?change.reviewer_id.map(|r| r.value()),
            "Application status changed"
        );

        self.load(application.id).await
    }

    /// Shared path for approve and reject.
    async fn review(
        &self,
        principal: Principal,
        id: ApplicationId,
        change: StatusChange,
    ) -> Result<Application, ApplicationError> {
        let application = self.load(id).await?;
        ensure_transition(application.status, change.status)?;

        let school = self.school_of(&application).await?;
        require_reviewer(&principal, &school)?;

        let updated = self.transition(&application, &change).await?;

        self.notifications.dispatch(Notification::ApplicationStatus {
            email: updated.details.email.clone(),
            applicant_name: updated.details.student_name.clone(),
            school_name: school.name,
            status: updated.status,
            reason: updated.rejection_reason.clone(),
        });

        Ok(updated)
    }

    /// Looks up the school leader and queues the new-application notice.
    /// Runs after the insert has committed, so lookup failures are only logged.
    async fn notify_leader(&self, school: &School, application: &Application) {
        match self.store.get_account(school.leader_id).await {
            Ok(Some(leader)) => self.notifications.dispatch(Notification::NewApplication {
                leader_email: leader.email,
                applicant_name: application.details.student_name.clone(),
                school_name: school.name.clone(),
            }),
            Ok(None) => warn!(
                event = "notification_failed",
                school_id = %school.id,
                "School leader account is missing"
            ),
            Err(e) => warn!(
                event = "notification_failed",
                school_id = %school.id,
                error = %e,
                "Failed to look up school leader"
            ),
        }
    }
}

#[async_trait]
impl ApplicationService for SeaOrmApplicationService {
    async fn submit(
        &self,
        principal: Principal,
        school_id: SchoolId,
        details: ApplicationDetails,
    ) -> Result<Application, ApplicationError> {
        require_role(&principal, Role::Student)?;
        let details = details.normalized().map_err(ApplicationError::Validation)?;

        let school = self
            .store
            .get_school(school_id)
            .await?
            .ok_or(ApplicationError::SchoolNotFound)?;

        if self
            .store
            .find_duplicate_application(principal.account_id, school_id)
            .await?
            .is_some()
        {
            return Err(ApplicationError::DuplicateApplication);
        }

        // The unique index catches a concurrent submit that passed the check above.
        let application = match self
            .store
            .insert_application(principal.account_id, school_id, &details, self.clock.now())
            .await?
        {
            InsertOutcome::Inserted(application) => application,
            InsertOutcome::Duplicate => return Err(ApplicationError::DuplicateApplication),
        };

        metrics::counter!("application_transitions_total", "status" => "pending").increment(1);
        info!(
            event = "application_submitted",
            application_id = %application.id,
            applicant_id = %principal.account_id,
            school_id = %school_id,
            "Application submitted"
        );

        self.notify_leader(&school, &application).await;

        Ok(application)
    }

    async fn approve(
        &self,
        principal: Principal,
        id: ApplicationId,
    ) -> Result<Application, ApplicationError> {
        self.review(principal, id, StatusChange::approved(principal.account_id))
            .await
    }

    async fn reject(
        &self,
        principal: Principal,
        id: ApplicationId,
        reason: &str,
    ) -> Result<Application, ApplicationError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ApplicationError::MissingReason);
        }

        self.review(
            principal,
            id,
            StatusChange::rejected(principal.account_id, reason.to_string()),
        )
        .await
    }

    async fn withdraw(
        &self,
        principal: Principal,
        id: ApplicationId,
    ) -> Result<Application, ApplicationError> {
        let application = self.load(id).await?;
        require_account(&principal, application.applicant_id)?;
        ensure_transition(application.status, ApplicationStatus::Withdrawn)?;

        self.transition(&application, &StatusChange::withdrawn())
            .await
    }

    async fn get(
        &self,
        principal: Principal,
        id: ApplicationId,
    ) -> Result<Application, ApplicationError> {
        let application = self.load(id).await?;

        if require_account(&principal, application.applicant_id).is_err() {
            let school = self.school_of(&application).await?;
            require_reviewer(&principal, &school)?;
        }

        Ok(application)
    }

    async fn list(&self, principal: Principal) -> Result<Vec<Application>, ApplicationError> {
        let applications = match principal.role {
            Role::Student => {
                self.store
                    .list_applications_for_applicant(principal.account_id)
                    .await?
            }
            Role::Leader => {
                let school_ids: Vec<SchoolId> = self
                    .store
                    .list_schools_for_leader(principal.account_id)
                    .await?
                    .into_iter()
                    .map(|s| s.id)
                    .collect();
                self.store.list_applications_for_schools(&school_ids).await?
            }
            Role::Admin => self.store.list_all_applications().await?,
        };

        Ok(applications)
    }

    async fn update_details(
        &self,
        principal: Principal,
        id: ApplicationId,
        details: ApplicationDetails,
    ) -> Result<Application, ApplicationError> {
        let application = self.load(id).await?;
        require_account(&principal, application.applicant_id)?;
        let details = details.normalized().map_err(ApplicationError::Validation)?;

        if application.status != ApplicationStatus::Pending {
            return Err(ApplicationError::InvalidTransition {
                from: application.status,
                to: ApplicationStatus::Pending,
            });
        }

        if !self
            .store
            .update_application_details(id, &details, self.clock.now())
            .await?
        {
            let current = self.load(id).await?;
            return Err(ApplicationError::InvalidTransition {
                from: current.status,
                to: ApplicationStatus::Pending,
            });
        }

        info!(event = "application_updated", application_id = %id, "Application details updated");

        self.load(id).await
    }
}
