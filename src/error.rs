//! Error handling for the stash ledger
//!
//! Defines the error taxonomy surfaced to callers and establishes a unified
//! Result type using anyhow for context chaining and error propagation.
//! Callers classify failures with `err.downcast_ref::<LedgerError>()`.

use thiserror::Error;

use crate::validation::ValidationIssue;

/// Core error types for ledger operations
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("validation error: {}", describe_issues(.0))]
    Validation(Vec<ValidationIssue>),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl LedgerError {
    pub fn user_not_found(id: impl ToString) -> Self {
        LedgerError::NotFound {
            entity: "user",
            id: id.to_string(),
        }
    }

    pub fn item_not_found(id: impl ToString) -> Self {
        LedgerError::NotFound {
            entity: "item",
            id: id.to_string(),
        }
    }

    /// Money arithmetic that would overflow `Decimal`
    pub fn amount_out_of_range(detail: impl Into<String>) -> Self {
        LedgerError::Validation(vec![ValidationIssue::new(
            "amount",
            detail,
            "is out of range",
        )])
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound { .. })
    }
}

fn describe_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for ledger operations
pub type Result<T> = anyhow::Result<T>;

/// Returns the ledger error kind behind an anyhow error, if any.
pub fn ledger_error(err: &anyhow::Error) -> Option<&LedgerError> {
    err.downcast_ref::<LedgerError>()
}
