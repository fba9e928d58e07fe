//! Payload canonicalization and validation seam.
//!
//! Entity-specific shaping (field renames, derived values, domain rules)
//! plugs in here. The pipeline itself only promises the ordering: transform
//! first, validate second, and nothing touches the store until both passed.

use serde_json::Value;

use vendhub_core::FieldViolation;
use vendhub_store::Patch;

pub trait PayloadShape: Send + Sync {
    /// Reshape a raw event or command payload into the canonical record
    /// shape. Runs before validation and before id/timestamp injection.
    fn canonicalize(&self, raw: Value) -> Value {
        raw
    }

    /// Validate a canonical payload. Violations abort before any side effect.
    fn validate(&self, _canonical: &Value) -> Vec<FieldViolation> {
        Vec::new()
    }

    /// Validate a partial update payload.
    fn validate_patch(&self, _patch: &Patch) -> Vec<FieldViolation> {
        Vec::new()
    }
}

/// No reshaping, no rules. The default for pure replicas, whose upstream
/// owner already validated the data.
pub struct Passthrough;

impl PayloadShape for Passthrough {}

/// Requires a fixed set of fields to be present and non-null.
pub struct RequiredFields {
    fields: &'static [&'static str],
}

impl RequiredFields {
    pub fn new(fields: &'static [&'static str]) -> Self {
        Self { fields }
    }
}

impl PayloadShape for RequiredFields {
    fn validate(&self, canonical: &Value) -> Vec<FieldViolation> {
        let mut violations = Vec::new();
        for field in self.fields {
            let present = canonical
                .get(field)
                .is_some_and(|v| !v.is_null() && v.as_str() != Some(""));
            if !present {
                violations.push(FieldViolation::new(*field, "is required", "missing"));
            }
        }
        violations
    }

    fn validate_patch(&self, patch: &Patch) -> Vec<FieldViolation> {
        let mut violations = Vec::new();
        for field in self.fields {
            if let Some(value) = patch.get(*field) {
                if value.is_null() || value.as_str() == Some("") {
                    violations.push(FieldViolation::new(*field, "cannot be cleared", "missing"));
                }
            }
        }
        violations
    }
}
