//! Outbound notification messages.
//!
//! These are handed to a [`crate::clients::Notifier`] after the state change
//! that produced them has already been committed.

use serde::Serialize;

use super::ApplicationStatus;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum Notification {
    VerificationCode {
        email: String,
        code: String,
        expires_in_minutes: i64,
    },
    NewApplication {
        leader_email: String,
        applicant_name: String,
        school_name: String,
    },
    ApplicationStatus {
        email: String,
        applicant_name: String,
        school_name: String,
        status: ApplicationStatus,
        reason: Option<String>,
    },
}

impl Notification {
    /// Short label used for metrics and log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::VerificationCode { .. } => "verification_code",
            Self::NewApplication { .. } => "new_application",
            Self::ApplicationStatus { .. } => "application_status",
        }
    }

    #[must_use]
    pub fn recipient(&self) -> &str {
        match self {
            Self::VerificationCode { email, .. } | Self::ApplicationStatus { email, .. } => email,
            Self::NewApplication { leader_email, .. } => leader_email,
        }
    }

    #[must_use]
    pub fn subject(&self) -> String {
        match self {
            Self::VerificationCode { .. } => "Your verification code".to_string(),
            Self::NewApplication { school_name, .. } => {
                format!("New application for {school_name}")
            }
            Self::ApplicationStatus {
                school_name,
                status,
                ..
            } => format!("Your application to {school_name} was {status}"),
        }
    }

    #[must_use]
    pub fn body(&self) -> String {
        match self {
            Self::VerificationCode {
                code,
                expires_in_minutes,
                ..
            } => format!(
                "Your verification code is {code}. It expires in {expires_in_minutes} minutes."
            ),
            Self::NewApplication {
                applicant_name,
                school_name,
                ..
            } => format!("{applicant_name} has submitted an application to {school_name}."),
            Self::ApplicationStatus {
                applicant_name,
                school_name,
                status,
                reason,
                ..
            } => {
                let mut body = format!(
                    "Hello {applicant_name}, your application to {school_name} has been {status}."
                );
                if let Some(reason) = reason {
                    body.push_str("\nReason: ");
                    body.push_str(reason);
                }
                body
            }
        }
    }
}
