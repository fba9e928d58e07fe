//! Generic repository contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use vendhub_core::EntityId;

use crate::descriptor::Persistable;
use crate::error::StoreError;
use crate::query::{Filter, ListQuery, Listing};

/// Partial update payload: column name to new value. Keys that are not
/// descriptor columns are ignored.
pub type Patch = Map<String, Value>;

/// CRUD plus the replication primitives, generic over any [`Persistable`].
///
/// Reads and single-record writes see only live rows for soft-deleted
/// entities; `sync` addresses rows regardless of deletion state so replicas
/// converge no matter what happened locally. The repository holds no
/// in-process locks: conflicting writes race at the backing store under its
/// row-level guarantees.
#[async_trait]
pub trait Repository<E: Persistable>: Send + Sync {
    /// Insert a new record. An existing id is a conflict.
    async fn create(&self, record: E) -> Result<E, StoreError>;

    async fn find_all(&self, query: &ListQuery) -> Result<Listing<E>, StoreError>;

    /// Fetch one live record by id, further narrowed by `filter`.
    async fn find_one(&self, id: &EntityId, filter: &Filter) -> Result<Option<E>, StoreError>;

    /// Apply a partial update and stamp `updated_at`. Unknown patch keys are
    /// ignored; a missing or deleted row is [`StoreError::NotFound`].
    async fn update(&self, id: &EntityId, patch: Patch) -> Result<E, StoreError>;

    /// Soft or hard delete per the descriptor's strategy, returning the
    /// record as deleted.
    async fn delete(&self, id: &EntityId) -> Result<E, StoreError>;

    /// Clear `deleted_at` on a soft-deleted row. Hard-delete entities have
    /// nothing to restore, so this is always [`StoreError::NotFound`] there.
    async fn restore(&self, id: &EntityId) -> Result<E, StoreError>;

    /// Live records matching `filter`.
    async fn count(&self, filter: &Filter) -> Result<u64, StoreError>;

    /// Idempotent bulk upsert keyed by id: insert missing rows, overwrite
    /// column values on existing ones, refresh `updated_at`, and never touch
    /// `created_at` or `deleted_at` of rows already present.
    async fn sync(&self, records: Vec<E>) -> Result<Vec<E>, StoreError>;
}

#[async_trait]
impl<E, R> Repository<E> for Arc<R>
where
    E: Persistable,
    R: Repository<E> + ?Sized,
{
    async fn create(&self, record: E) -> Result<E, StoreError> {
        (**self).create(record).await
    }

    async fn find_all(&self, query: &ListQuery) -> Result<Listing<E>, StoreError> {
        (**self).find_all(query).await
    }

    async fn find_one(&self, id: &EntityId, filter: &Filter) -> Result<Option<E>, StoreError> {
        (**self).find_one(id, filter).await
    }

    async fn update(&self, id: &EntityId, patch: Patch) -> Result<E, StoreError> {
        (**self).update(id, patch).await
    }

    async fn delete(&self, id: &EntityId) -> Result<E, StoreError> {
        (**self).delete(id).await
    }

    async fn restore(&self, id: &EntityId) -> Result<E, StoreError> {
        (**self).restore(id).await
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        (**self).count(filter).await
    }

    async fn sync(&self, records: Vec<E>) -> Result<Vec<E>, StoreError> {
        (**self).sync(records).await
    }
}
