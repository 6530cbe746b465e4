//! Error types for the rota scheduling pipeline.

use chrono::NaiveDate;
use thiserror::Error;

use crate::types::EmployeeNumber;

/// Main error type for rota operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RotaError {
    /// The extractor could not produce any candidate intent.
    #[error("Could not interpret request: {reason}")]
    InterpretationFailure { reason: String },

    /// The request matched more than one plausible intent.
    #[error("Ambiguous request: {reason}")]
    AmbiguousIntent { reason: String },

    /// One or more named rules failed against a hypothetical edit.
    #[error("Rule '{rule}' violated: {message}")]
    RuleViolation { rule: String, message: String },

    /// A stored entry advanced past the version the edit was derived from.
    #[error("Stale write on {}", format_dates(.dates))]
    StaleWrite { dates: Vec<NaiveDate> },

    /// Optimistic retries were exhausted.
    #[error("Gave up after {attempts} attempts due to concurrent schedule changes")]
    Contention { attempts: u32 },

    /// An edit referenced an employee that is not on the roster, or a
    /// roster change would orphan schedule entries.
    #[error("Referential integrity failure for employee {employee_number}: {context}")]
    ReferentialIntegrity {
        employee_number: EmployeeNumber,
        context: String,
    },

    /// Operation timed out.
    #[error("Operation timed out after {duration_ms}ms: {message}")]
    Timeout { duration_ms: u64, message: String },

    /// The request was cancelled before the commit began.
    #[error("Request cancelled: {reason}")]
    Cancelled { reason: String },

    /// Resource not found.
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    /// Input failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A create operation collided with an existing record.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The language-model capability failed.
    #[error("Language model error: {message}")]
    ModelError { message: String, transient: bool },

    /// Store backend error.
    #[error("Store error: {message}")]
    StoreError { message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Internal error (should not happen).
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_dates(dates: &[NaiveDate]) -> String {
    dates
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl RotaError {
    /// Returns true if the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            RotaError::StaleWrite { .. } => true,
            RotaError::Contention { .. } => true,
            RotaError::Timeout { .. } => true,
            RotaError::ModelError { transient, .. } => *transient,
            _ => false,
        }
    }

    /// Shorthand for a missing employee.
    pub fn employee_not_found(employee_number: &EmployeeNumber) -> Self {
        RotaError::NotFound {
            resource_type: "employee".to_string(),
            id: employee_number.to_string(),
        }
    }
}

/// Convenience Result type for rota operations.
pub type Result<T> = std::result::Result<T, RotaError>;

impl From<serde_json::Error> for RotaError {
    fn from(err: serde_json::Error) -> Self {
        RotaError::SerializationError(err.to_string())
    }
}
