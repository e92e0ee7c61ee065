use thiserror::Error;

use crate::models::ValidationError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StoreErrorKind {
    Validation,
    Storage,
    Migration,
    ProcessFailure,
    Timeout,
    Config,
}

/// Error surfaced by the persistence layer. `operation` names the public
/// operation that failed so callers can attribute the fault.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("{operation} failed: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub operation: String,
    pub message: String,
}

impl StoreError {
    pub fn new(
        kind: StoreErrorKind,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub(crate) fn storage(operation: &str, error: rusqlite::Error) -> Self {
        Self::new(StoreErrorKind::Storage, operation, error.to_string())
    }
}

/// Decoding a flat record is attributed to the `from_record` operation.
impl From<ValidationError> for StoreError {
    fn from(error: ValidationError) -> Self {
        Self::new(StoreErrorKind::Validation, "from_record", error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_convert_to_validation_kind() {
        let error = StoreError::from(ValidationError::MissingField { field: "name" });

        assert_eq!(error.kind, StoreErrorKind::Validation);
        assert_eq!(
            error.to_string(),
            "from_record failed: missing required field 'name'"
        );
    }
}
