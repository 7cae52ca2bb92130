use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which kind of owned entry an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    MedicalHistory,
    Lifestyle,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::MedicalHistory => f.write_str("medical history entry"),
            EntryKind::Lifestyle => f.write_str("lifestyle entry"),
        }
    }
}

/// One failed rule on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub rule: &'static str,
    pub message: String,
}

/// All failed rules for a single payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Vec<FieldViolation>) -> Self {
        self.details = details;
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.details.is_empty() {
            return write!(f, "{}: {}", self.code, self.message);
        }
        let details: Vec<&str> = self.details.iter().map(|d| d.message.as_str()).collect();
        write!(f, "{}: {} - {}", self.code, self.message, details.join("; "))
    }
}

/// Error kinds returned by the resource services.
///
/// The HTTP layer matches on this exhaustively; nothing else crosses the
/// service boundary.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(ValidationError),

    #[error("patient not found: {patient_id}")]
    OwnerNotFound { patient_id: i64 },

    #[error("{kind} not found: {id}")]
    EntryNotFound { kind: EntryKind, id: i64 },

    #[error("forbidden")]
    Forbidden,

    #[error("authorization check failed: {0}")]
    AuthorizationFailed(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::InvalidInput(err)
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_with_details() {
        let err = ValidationError::new("INVALID_PATIENT_DATA", "Validation errors occurred")
            .with_details(vec![FieldViolation {
                field: "sex",
                rule: "one_of",
                message: "sex must be one of [Male, Female, Other]".to_string(),
            }]);
        let text = err.to_string();
        assert!(text.starts_with("INVALID_PATIENT_DATA: Validation errors occurred"));
        assert!(text.contains("sex must be one of"));
    }

    #[test]
    fn test_validation_error_serialization_skips_empty_details() {
        let err = ValidationError::new("INCONSISTENT_DATA", "Age and DateOfBirth are inconsistent");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INCONSISTENT_DATA");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_entry_not_found_message() {
        let err = ServiceError::EntryNotFound {
            kind: EntryKind::Lifestyle,
            id: 7,
        };
        assert_eq!(err.to_string(), "lifestyle entry not found: 7");
    }
}
