//! Uniform response envelope returned by every handler.
//!
//! Both event consumption and command dispatch reply with this shape, so
//! callers never see a raw error. `statusCode` mirrors HTTP conventions even
//! though no HTTP server is involved.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DomainError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    pub status_code: u16,
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Value::Null,
            errors: None,
            status_code: 200,
        }
    }

    pub fn created(message: impl Into<String>) -> Self {
        Self {
            status_code: 201,
            ..Self::ok(message)
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Failure envelope carrying the error taxonomy's status code and the
    /// flattened detail lines.
    pub fn rejected(err: &DomainError, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: Value::Null,
            errors: Some(err.details()),
            status_code: err.status_code(),
        }
    }
}

impl From<DomainError> for Response {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        Self::rejected(&err, message)
    }
}
