//! Record trait: identity plus the audit timestamps every replicated row carries.

use chrono::{DateTime, Utc};

use crate::id::EntityId;

/// Minimal interface over a persisted record.
///
/// Every record has an identifier and audit timestamps. Soft-deletable
/// records additionally expose `deleted_at`; hard-deleted ones keep the
/// default no-op accessors.
pub trait Record: Clone + Send + Sync + 'static {
    fn id(&self) -> &EntityId;

    fn created_at(&self) -> DateTime<Utc>;

    fn updated_at(&self) -> DateTime<Utc>;

    fn set_created_at(&mut self, at: DateTime<Utc>);

    fn set_updated_at(&mut self, at: DateTime<Utc>);

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn set_deleted_at(&mut self, _at: Option<DateTime<Utc>>) {}
}

/// Implements [`Record`] for a struct with the conventional audit fields.
///
/// The plain form covers hard-deleted records (`id`, `created_at`,
/// `updated_at`); the `soft` form additionally wires `deleted_at`.
#[macro_export]
macro_rules! record_audit {
    ($t:ty) => {
        impl $crate::Record for $t {
            fn id(&self) -> &$crate::EntityId {
                &self.id
            }

            fn created_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.created_at
            }

            fn updated_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.updated_at
            }

            fn set_created_at(&mut self, at: ::chrono::DateTime<::chrono::Utc>) {
                self.created_at = at;
            }

            fn set_updated_at(&mut self, at: ::chrono::DateTime<::chrono::Utc>) {
                self.updated_at = at;
            }
        }
    };
    ($t:ty, soft) => {
        impl $crate::Record for $t {
            fn id(&self) -> &$crate::EntityId {
                &self.id
            }

            fn created_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.created_at
            }

            fn updated_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.updated_at
            }

            fn set_created_at(&mut self, at: ::chrono::DateTime<::chrono::Utc>) {
                self.created_at = at;
            }

            fn set_updated_at(&mut self, at: ::chrono::DateTime<::chrono::Utc>) {
                self.updated_at = at;
            }

            fn deleted_at(&self) -> Option<::chrono::DateTime<::chrono::Utc>> {
                self.deleted_at
            }

            fn set_deleted_at(&mut self, at: Option<::chrono::DateTime<::chrono::Utc>>) {
                self.deleted_at = at;
            }
        }
    };
}
