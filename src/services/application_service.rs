//! Domain service for the application lifecycle.
//!
//! Every status change is a conditional update from `pending`; the stored
//! row is the source of truth and notifications follow the commit.

use thiserror::Error;

use crate::domain::{ApplicationId, ApplicationStatus, Principal, SchoolId};
use crate::models::{Application, ApplicationDetails};
use crate::services::access::Forbidden;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("You are not allowed to perform this action")]
    Forbidden,

    #[error("Application not found")]
    NotFound,

    #[error("School not found")]
    SchoolNotFound,

    #[error("An application to this school already exists")]
    DuplicateApplication,

    #[error("Cannot move application from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    #[error("A rejection reason is required")]
    MissingReason,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<Forbidden> for ApplicationError {
    fn from(_: Forbidden) -> Self {
        Self::Forbidden
    }
}

impl From<sea_orm::DbErr> for ApplicationError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for ApplicationError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[async_trait::async_trait]
pub trait ApplicationService: Send + Sync {
    /// Files a pending application for the calling student.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::DuplicateApplication`] if the student has
    /// ever applied to the school, whatever that application's status.
    async fn submit(
        &self,
        principal: Principal,
        school_id: SchoolId,
        details: ApplicationDetails,
    ) -> Result<Application, ApplicationError>;

    /// Approves a pending application. Allowed for admins and for the leader
    /// owning the school.
    async fn approve(
        &self,
        principal: Principal,
        id: ApplicationId,
    ) -> Result<Application, ApplicationError>;

    /// Rejects a pending application with a non-blank reason.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::MissingReason`] before touching storage
    /// when `reason` is blank.
    async fn reject(
        &self,
        principal: Principal,
        id: ApplicationId,
        reason: &str,
    ) -> Result<Application, ApplicationError>;

    /// Withdraws a pending application. Only the applicant may do this.
    async fn withdraw(
        &self,
        principal: Principal,
        id: ApplicationId,
    ) -> Result<Application, ApplicationError>;

    async fn get(
        &self,
        principal: Principal,
        id: ApplicationId,
    ) -> Result<Application, ApplicationError>;

    /// Applications visible to the caller, newest first.
    async fn list(&self, principal: Principal) -> Result<Vec<Application>, ApplicationError>;

    /// Replaces the applicant snapshot while the application is pending.
    async fn update_details(
        &self,
        principal: Principal,
        id: ApplicationId,
        details: ApplicationDetails,
    ) -> Result<Application, ApplicationError>;
}
