use serde::{Deserialize, Serialize};

use crate::domain::{AccountId, ApplicationId, ApplicationStatus, SchoolId};
use crate::entities::applications;

const MAX_NAME_LEN: usize = 120;
const MAX_NOTES_LEN: usize = 2000;

/// Applicant snapshot captured at submission. Only the owning applicant can
/// replace it, and only while the application is pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDetails {
    pub student_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub guardian_name: Option<String>,
    #[serde(default)]
    pub guardian_phone: Option<String>,
    #[serde(default)]
    pub current_grade: Option<String>,
    #[serde(default)]
    pub applying_grade: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ApplicationDetails {
    /// Trims every field, turns blank optionals into `None` and checks the
    /// required ones.
    pub fn normalized(self) -> Result<Self, String> {
        let details = Self {
            student_name: self.student_name.trim().to_string(),
            email: crate::domain::normalize_email(&self.email),
            phone: blank_to_none(self.phone),
            guardian_name: blank_to_none(self.guardian_name),
            guardian_phone: blank_to_none(self.guardian_phone),
            current_grade: blank_to_none(self.current_grade),
            applying_grade: blank_to_none(self.applying_grade),
            notes: blank_to_none(self.notes),
        };

        if details.student_name.is_empty() {
            return Err("Student name is required".to_string());
        }
        if details.student_name.chars().count() > MAX_NAME_LEN {
            return Err(format!(
                "Student name must be {MAX_NAME_LEN} characters or less"
            ));
        }
        if !crate::api::validation::is_valid_email(&details.email) {
            return Err("A valid contact email is required".to_string());
        }
        if details
            .notes
            .as_ref()
            .is_some_and(|n| n.chars().count() > MAX_NOTES_LEN)
        {
            return Err(format!("Notes must be {MAX_NOTES_LEN} characters or less"));
        }

        Ok(details)
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Application {
    pub id: ApplicationId,
    pub applicant_id: AccountId,
    pub school_id: SchoolId,
    #[serde(flatten)]
    pub details: ApplicationDetails,
    pub status: ApplicationStatus,
    pub rejection_reason: Option<String>,
    pub reviewer_id: Option<AccountId>,
    pub reviewed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<applications::Model> for Application {
    fn from(m: applications::Model) -> Self {
        Self {
            id: ApplicationId::new(m.id),
            applicant_id: AccountId::new(m.applicant_id),
            school_id: SchoolId::new(m.school_id),
            details: ApplicationDetails {
                student_name: m.student_name,
                email: m.email,
                phone: m.phone,
                guardian_name: m.guardian_name,
                guardian_phone: m.guardian_phone,
                current_grade: m.current_grade,
                applying_grade: m.applying_grade,
                notes: m.notes,
            },
            status: m.status,
            rejection_reason: m.rejection_reason,
            reviewer_id: m.reviewer_id.map(AccountId::new),
            reviewed_at: m.reviewed_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Fields written together with a status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub status: ApplicationStatus,
    pub reviewer_id: Option<AccountId>,
    pub rejection_reason: Option<String>,
}

impl StatusChange {
    #[must_use]
    pub const fn approved(reviewer: AccountId) -> Self {
        Self {
            status: ApplicationStatus::Approved,
            reviewer_id: Some(reviewer),
            rejection_reason: None,
        }
    }

    #[must_use]
    pub const fn rejected(reviewer: AccountId, reason: String) -> Self {
        Self {
            status: ApplicationStatus::Rejected,
            reviewer_id: Some(reviewer),
            rejection_reason: Some(reason),
        }
    }

    #[must_use]
    pub const fn withdrawn() -> Self {
        Self {
            status: ApplicationStatus::Withdrawn,
            reviewer_id: None,
            rejection_reason: None,
        }
    }
}
