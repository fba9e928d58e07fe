//! Domain error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
    pub code: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

impl core::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {} ({})", self.field, self.message, self.code)
    }
}

/// Domain-level error.
///
/// Keep this focused on deterministic business failures. Infrastructure
/// concerns (broker, store connectivity) carry their own error types and are
/// folded into [`DomainError::Unknown`] at the service boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input failed validation before any side effect ran.
    #[error("validation failed")]
    Validation(Vec<FieldViolation>),

    /// The addressed record does not exist (or is soft-deleted).
    #[error("not found")]
    NotFound,

    /// A uniqueness or referential rule was violated by the store.
    #[error("conflict on {field}: {message}")]
    Conflict { field: String, message: String },

    /// Anything unexpected. Surfaces as an internal error to callers.
    #[error("{0}")]
    Unknown(String),
}

impl DomainError {
    pub fn validation(violations: Vec<FieldViolation>) -> Self {
        Self::Validation(violations)
    }

    /// Single-field validation failure.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Validation(vec![FieldViolation::new(field, message, code)])
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn conflict(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown(message.into())
    }

    /// HTTP-style status code carried on response envelopes.
    ///
    /// Conflicts map to 400 rather than 409: downstream consumers of the
    /// original wire contract key on 400 for all rejected writes.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::Conflict { .. } => 400,
            Self::NotFound => 404,
            Self::Unknown(_) => 500,
        }
    }

    /// Flatten into human-readable detail lines for an envelope `errors` list.
    pub fn details(&self) -> Vec<String> {
        match self {
            Self::Validation(violations) => violations.iter().map(ToString::to_string).collect(),
            other => vec![other.to_string()],
        }
    }
}
