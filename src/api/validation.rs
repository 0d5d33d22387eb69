use regex::Regex;
use std::sync::OnceLock;

use super::ApiError;

const MAX_EMAIL_LEN: usize = 254;

/// Loose shape check: one `@`, no whitespace, a dot in the domain.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid regex pattern defined in code")
    });

    email.len() <= MAX_EMAIL_LEN && re.is_match(email)
}

pub fn validate_id(id: i32, resource: &str) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid {resource} ID: {id}. ID must be a positive integer"
        )));
    }
    Ok(id)
}

pub fn validate_required<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("student@example.com"));
        assert!(is_valid_email("a.b+c@school.co.uk"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("space in@example.com"));
        assert!(!is_valid_email("nodot@example"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id(1, "application").is_ok());
        assert!(validate_id(0, "application").is_err());
        assert!(validate_id(-5, "school").is_err());
    }

    #[test]
    fn test_validate_required() {
        assert_eq!(validate_required("  x ", "Email").unwrap(), "x");
        assert!(validate_required("   ", "Email").is_err());
    }
}
