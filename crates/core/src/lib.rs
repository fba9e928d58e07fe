//! `vendhub-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! opaque identifiers, the error taxonomy, the response envelope and the
//! record audit interface.

pub mod error;
pub mod id;
pub mod record;
pub mod response;

pub use error::{DomainError, DomainResult, FieldViolation};
pub use id::EntityId;
pub use record::Record;
pub use response::Response;
