//! Store error model and its mapping onto the domain taxonomy.

use thiserror::Error;

use vendhub_core::DomainError;

#[derive(Debug, Error)]
pub enum StoreError {
    /// No visible row for the addressed id.
    #[error("record not found")]
    NotFound,

    /// Uniqueness or referential constraint violation.
    #[error("conflict on {field}: {message}")]
    Conflict { field: String, message: String },

    /// A payload value does not fit its column.
    #[error("invalid value for {column}: {message}")]
    InvalidValue { column: String, message: String },

    /// A filter or sort referenced a column the descriptor does not declare.
    #[error("unknown column `{0}`")]
    UnknownColumn(String),

    /// Record <-> row mapping failed.
    #[error("codec: {0}")]
    Codec(String),

    #[error("database: {0}")]
    Database(String),
}

impl StoreError {
    pub fn conflict(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_value(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            column: column.into(),
            message: message.into(),
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => DomainError::NotFound,
            StoreError::Conflict { field, message } => DomainError::Conflict { field, message },
            StoreError::InvalidValue { column, message } => {
                DomainError::invalid(column, message, "invalid_value")
            }
            StoreError::UnknownColumn(column) => {
                DomainError::invalid(column, "unknown column", "unknown_column")
            }
            err @ (StoreError::Codec(_) | StoreError::Database(_)) => {
                DomainError::unknown(err.to_string())
            }
        }
    }
}
