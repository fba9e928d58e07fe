//! Generic entity service: payload in, response envelope out.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::instrument;

use vendhub_core::{DomainError, EntityId, Response};
use vendhub_store::{Filter, ListQuery, Patch, Persistable, Repository};

use crate::shape::{PayloadShape, Passthrough};

/// How much to trust payloads arriving on the event channel.
///
/// Replicated data was already validated by its owning service, so the
/// default is to trust it; `Enforce` reruns shape validation anyway, which
/// turns bad foreign payloads into dead-letters instead of bad rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplicaValidation {
    #[default]
    Trust,
    Enforce,
}

/// Uniform application service over one [`Persistable`] entity.
///
/// Every operation returns a [`Response`] envelope, success or failure;
/// errors never escape as raw values. Side effects happen only after the
/// transform and validation steps both passed.
pub struct EntityService<E: Persistable> {
    repo: Arc<dyn Repository<E>>,
    shape: Arc<dyn PayloadShape>,
    validation: ReplicaValidation,
}

impl<E: Persistable> Clone for EntityService<E> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            shape: Arc::clone(&self.shape),
            validation: self.validation,
        }
    }
}

impl<E: Persistable> EntityService<E> {
    pub fn new(repo: Arc<dyn Repository<E>>) -> Self {
        Self {
            repo,
            shape: Arc::new(Passthrough),
            validation: ReplicaValidation::default(),
        }
    }

    pub fn with_shape(mut self, shape: Arc<dyn PayloadShape>) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_validation(mut self, validation: ReplicaValidation) -> Self {
        self.validation = validation;
        self
    }

    fn domain() -> &'static str {
        E::descriptor().domain
    }

    fn not_found() -> Response {
        Response::rejected(&DomainError::NotFound, format!("{} not found", Self::domain()))
    }

    fn reject(err: DomainError) -> Response {
        let message = match &err {
            DomainError::Validation(_) => format!("{} rejected", Self::domain()),
            DomainError::NotFound => format!("{} not found", Self::domain()),
            DomainError::Conflict { .. } => format!("{} conflict", Self::domain()),
            DomainError::Unknown(_) => format!("{} failed", Self::domain()),
        };
        Response::rejected(&err, message)
    }

    fn record_envelope(record: &E, message: String, created: bool) -> Response {
        match serde_json::to_value(record) {
            Ok(data) => if created {
                Response::created(message)
            } else {
                Response::ok(message)
            }
            .with_data(data),
            Err(err) => Self::reject(DomainError::unknown(format!("serialize record: {err}"))),
        }
    }

    /// Canonicalize, validate (unless a trusted replica write), materialize.
    fn shaped(&self, raw: Value, trusted: bool) -> Result<E, DomainError> {
        let canonical = self.shape.canonicalize(raw);
        if !(trusted && self.validation == ReplicaValidation::Trust) {
            let violations = self.shape.validate(&canonical);
            if !violations.is_empty() {
                return Err(DomainError::validation(violations));
            }
        }
        materialize(canonical)
    }

    /// Insert a new locally-authored record.
    #[instrument(skip_all, fields(entity = E::descriptor().domain))]
    pub async fn create(&self, raw: Value) -> Response {
        let record = match self.shaped(raw, false) {
            Ok(record) => record,
            Err(err) => return Self::reject(err),
        };
        match self.repo.create(record).await {
            Ok(record) => Self::record_envelope(&record, format!("{} created", Self::domain()), true),
            Err(err) => Self::reject(err.into()),
        }
    }

    pub async fn find_all(&self, query: ListQuery) -> Response {
        match self.repo.find_all(&query).await {
            Ok(listing) => match serde_json::to_value(&listing) {
                Ok(data) => Response::ok(format!("{} list", Self::domain())).with_data(data),
                Err(err) => Self::reject(DomainError::unknown(format!("serialize listing: {err}"))),
            },
            Err(err) => Self::reject(err.into()),
        }
    }

    pub async fn find_one(&self, id: &EntityId, filter: &Filter) -> Response {
        match self.repo.find_one(id, filter).await {
            Ok(Some(record)) => {
                Self::record_envelope(&record, format!("{} found", Self::domain()), false)
            }
            Ok(None) => Self::not_found(),
            Err(err) => Self::reject(err.into()),
        }
    }

    /// Partial update. Existence is checked before patch validation so a
    /// missing record is a 404 even when the patch is also bad.
    #[instrument(skip_all, fields(entity = E::descriptor().domain, id = %id))]
    pub async fn update(&self, id: &EntityId, patch: Patch) -> Response {
        match self.repo.find_one(id, &Filter::new()).await {
            Ok(Some(_)) => {}
            Ok(None) => return Self::not_found(),
            Err(err) => return Self::reject(err.into()),
        }
        let violations = self.shape.validate_patch(&patch);
        if !violations.is_empty() {
            return Self::reject(DomainError::validation(violations));
        }
        match self.repo.update(id, patch).await {
            Ok(record) => Self::record_envelope(&record, format!("{} updated", Self::domain()), false),
            Err(err) => Self::reject(err.into()),
        }
    }

    /// Delete, answering with the record as it looked before deletion.
    #[instrument(skip_all, fields(entity = E::descriptor().domain, id = %id))]
    pub async fn delete(&self, id: &EntityId) -> Response {
        let snapshot = match self.repo.find_one(id, &Filter::new()).await {
            Ok(Some(record)) => record,
            Ok(None) => return Self::not_found(),
            Err(err) => return Self::reject(err.into()),
        };
        match self.repo.delete(id).await {
            Ok(_) => Self::record_envelope(&snapshot, format!("{} deleted", Self::domain()), false),
            Err(err) => Self::reject(err.into()),
        }
    }

    #[instrument(skip_all, fields(entity = E::descriptor().domain, id = %id))]
    pub async fn restore(&self, id: &EntityId) -> Response {
        match self.repo.restore(id).await {
            Ok(record) => Self::record_envelope(&record, format!("{} restored", Self::domain()), false),
            Err(err) => Self::reject(err.into()),
        }
    }

    pub async fn count(&self, filter: &Filter) -> Response {
        match self.repo.count(filter).await {
            Ok(count) => {
                Response::ok(format!("{} count", Self::domain())).with_data(json!({ "count": count }))
            }
            Err(err) => Self::reject(err.into()),
        }
    }

    /// Bulk upsert of a batch of records. The whole batch is shaped and
    /// validated first; the upsert itself failing is an internal error, not
    /// a client one.
    #[instrument(skip_all, fields(entity = E::descriptor().domain))]
    pub async fn sync(&self, batch: Value) -> Response {
        let records = match self.shaped_batch(batch) {
            Ok(records) => records,
            Err(err) => return Self::reject(err),
        };
        let synced = match self.repo.sync(records).await {
            Ok(synced) => synced,
            Err(err) => return Self::reject(DomainError::unknown(err.to_string())),
        };
        match serde_json::to_value(&synced) {
            Ok(data) => Response::ok(format!("{} synced", Self::domain())).with_data(data),
            Err(err) => Self::reject(DomainError::unknown(format!("serialize records: {err}"))),
        }
    }

    fn shaped_batch(&self, batch: Value) -> Result<Vec<E>, DomainError> {
        let Value::Array(items) = batch else {
            return Err(DomainError::invalid("payload", "must be a JSON array", "invalid_payload"));
        };
        items
            .into_iter()
            .map(|item| self.shaped(item, true))
            .collect()
    }

    /// `<domain>.created` replica write. A conflict means the record was
    /// already replicated, which under at-least-once delivery is success.
    #[instrument(skip_all, fields(entity = E::descriptor().domain))]
    pub async fn replicate_created(&self, raw: Value) -> Response {
        let record = match self.shaped(raw, true) {
            Ok(record) => record,
            Err(err) => return Self::reject(err),
        };
        match self.repo.create(record).await {
            Ok(record) => Self::record_envelope(&record, format!("{} replicated", Self::domain()), true),
            Err(vendhub_store::StoreError::Conflict { .. }) => {
                Response::ok(format!("{} already replicated", Self::domain()))
            }
            Err(err) => Self::reject(err.into()),
        }
    }

    /// `<domain>.updated` replica write, implemented as an upsert so that a
    /// late or missing `created` event does not matter.
    #[instrument(skip_all, fields(entity = E::descriptor().domain))]
    pub async fn replicate_updated(&self, raw: Value) -> Response {
        let record = match self.shaped(raw, true) {
            Ok(record) => record,
            Err(err) => return Self::reject(err),
        };
        match self.repo.sync(vec![record]).await {
            Ok(mut synced) => match synced.pop() {
                Some(record) => {
                    Self::record_envelope(&record, format!("{} replicated", Self::domain()), false)
                }
                None => Self::reject(DomainError::unknown("upsert returned no record")),
            },
            Err(err) => Self::reject(DomainError::unknown(err.to_string())),
        }
    }

    /// `<domain>.deleted` replica write. Deleting something already gone is
    /// a no-op success, again because deliveries can repeat.
    #[instrument(skip_all, fields(entity = E::descriptor().domain))]
    pub async fn replicate_deleted(&self, raw: Value) -> Response {
        let id = match raw.get("id").and_then(coerce_id) {
            Some(id) => id,
            None => {
                return Self::reject(DomainError::invalid("id", "is required", "missing"));
            }
        };
        match self.repo.delete(&id).await {
            Ok(record) => Self::record_envelope(&record, format!("{} deleted", Self::domain()), false),
            Err(vendhub_store::StoreError::NotFound) => {
                Response::ok(format!("{} already absent", Self::domain()))
            }
            Err(err) => Self::reject(err.into()),
        }
    }
}

/// Inject id and audit timestamps, then decode the record.
///
/// Foreign ids are carried verbatim; numeric origin ids are kept as their
/// decimal form. A payload without an id gets a freshly minted one.
fn materialize<E: Persistable>(canonical: Value) -> Result<E, DomainError> {
    let Value::Object(mut object) = canonical else {
        return Err(DomainError::invalid("payload", "must be a JSON object", "invalid_payload"));
    };

    let id_value = match object.get("id") {
        Some(Value::String(s)) if !s.is_empty() => None,
        Some(Value::Number(n)) => Some(Value::String(n.to_string())),
        _ => Some(Value::String(EntityId::mint().into_string())),
    };
    if let Some(value) = id_value {
        object.insert("id".to_owned(), value);
    }

    let now = json!(Utc::now());
    if object.get("created_at").is_none_or(Value::is_null) {
        object.insert("created_at".to_owned(), now.clone());
    }
    if object.get("updated_at").is_none_or(Value::is_null) {
        object.insert("updated_at".to_owned(), now);
    }

    serde_json::from_value(Value::Object(object))
        .map_err(|err| DomainError::invalid("payload", err.to_string(), "malformed"))
}

/// Id as delivered on the wire: a string, or a number carried as text.
pub(crate) fn coerce_id(value: &Value) -> Option<EntityId> {
    match value {
        Value::String(s) if !s.is_empty() => Some(EntityId::from(s.as_str())),
        Value::Number(n) => Some(EntityId::from(n.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::RequiredFields;
    use vendhub_directory::Account;
    use vendhub_store::{InMemoryRepository, Listing, StoreError};

    fn repo() -> Arc<InMemoryRepository<Account>> {
        Arc::new(InMemoryRepository::new())
    }

    fn service(repo: Arc<InMemoryRepository<Account>>) -> EntityService<Account> {
        EntityService::new(repo).with_shape(Arc::new(RequiredFields::new(&["name"])))
    }

    #[tokio::test]
    async fn create_mints_id_and_timestamps() {
        let response = service(repo()).create(json!({ "name": "Acme" })).await;

        assert!(response.success);
        assert_eq!(response.status_code, 201);
        assert!(!response.data["id"].as_str().unwrap().is_empty());
        assert!(!response.data["created_at"].as_str().unwrap().is_empty());
        assert!(response.data["deleted_at"].is_null());
    }

    #[tokio::test]
    async fn create_keeps_a_provided_id() {
        let response = service(repo())
            .create(json!({ "id": "acc-1", "name": "Acme" }))
            .await;

        assert_eq!(response.data["id"], "acc-1");
    }

    #[tokio::test]
    async fn create_rejects_before_touching_the_store() {
        let repo = repo();
        let response = service(Arc::clone(&repo)).create(json!({ "email": "a@b.c" })).await;

        assert!(!response.success);
        assert_eq!(response.status_code, 400);
        assert!(response.errors.unwrap().iter().any(|e| e.contains("name")));
        let live = repo.count(&Filter::new()).await.unwrap();
        assert_eq!(live, 0);
    }

    #[tokio::test]
    async fn create_duplicate_id_is_a_conflict() {
        let svc = service(repo());
        svc.create(json!({ "id": "acc-1", "name": "Acme" })).await;

        let response = svc.create(json!({ "id": "acc-1", "name": "Again" })).await;

        assert!(!response.success);
        assert_eq!(response.status_code, 400);
    }

    #[tokio::test]
    async fn find_one_miss_is_a_not_found_envelope() {
        let response = service(repo())
            .find_one(&EntityId::from("nope"), &Filter::new())
            .await;

        assert!(!response.success);
        assert_eq!(response.status_code, 404);
        assert_eq!(response.message, "account not found");
    }

    /// Store whose every operation fails, as a disconnected backend would.
    struct UnreachableStore;

    #[async_trait::async_trait]
    impl Repository<Account> for UnreachableStore {
        async fn create(&self, _record: Account) -> Result<Account, StoreError> {
            Err(StoreError::Database("connection reset".to_owned()))
        }
        async fn find_all(&self, _query: &ListQuery) -> Result<Listing<Account>, StoreError> {
            Err(StoreError::Database("connection reset".to_owned()))
        }
        async fn find_one(
            &self,
            _id: &EntityId,
            _filter: &Filter,
        ) -> Result<Option<Account>, StoreError> {
            Err(StoreError::Database("connection reset".to_owned()))
        }
        async fn update(&self, _id: &EntityId, _patch: Patch) -> Result<Account, StoreError> {
            Err(StoreError::Database("connection reset".to_owned()))
        }
        async fn delete(&self, _id: &EntityId) -> Result<Account, StoreError> {
            Err(StoreError::Database("connection reset".to_owned()))
        }
        async fn restore(&self, _id: &EntityId) -> Result<Account, StoreError> {
            Err(StoreError::Database("connection reset".to_owned()))
        }
        async fn count(&self, _filter: &Filter) -> Result<u64, StoreError> {
            Err(StoreError::Database("connection reset".to_owned()))
        }
        async fn sync(&self, _records: Vec<Account>) -> Result<Vec<Account>, StoreError> {
            Err(StoreError::Database("connection reset".to_owned()))
        }
    }

    #[tokio::test]
    async fn store_failure_is_an_internal_error_envelope() {
        let svc = EntityService::<Account>::new(Arc::new(UnreachableStore));

        let response = svc.create(json!({ "name": "Acme" })).await;

        assert!(!response.success);
        assert_eq!(response.status_code, 500);
        assert_eq!(response.message, "account failed");
    }

    #[tokio::test]
    async fn update_checks_existence_before_the_patch() {
        let svc = service(repo());
        let mut patch = Patch::new();
        patch.insert("name".to_owned(), Value::Null);

        // Both wrong, but the missing record wins.
        let response = svc.update(&EntityId::from("nope"), patch).await;

        assert_eq!(response.status_code, 404);
    }

    #[tokio::test]
    async fn update_rejects_a_patch_clearing_a_required_field() {
        let svc = service(repo());
        svc.create(json!({ "id": "acc-1", "name": "Acme" })).await;
        let mut patch = Patch::new();
        patch.insert("name".to_owned(), Value::Null);

        let response = svc.update(&EntityId::from("acc-1"), patch).await;

        assert_eq!(response.status_code, 400);
    }

    #[tokio::test]
    async fn update_applies_a_valid_patch() {
        let svc = service(repo());
        svc.create(json!({ "id": "acc-1", "name": "Acme" })).await;
        let mut patch = Patch::new();
        patch.insert("name".to_owned(), json!("Acme GmbH"));

        let response = svc.update(&EntityId::from("acc-1"), patch).await;

        assert!(response.success);
        assert_eq!(response.data["name"], "Acme GmbH");
    }

    #[tokio::test]
    async fn delete_answers_with_the_pre_delete_snapshot() {
        let repo = repo();
        let svc = service(Arc::clone(&repo));
        svc.create(json!({ "id": "acc-1", "name": "Acme" })).await;

        let response = svc.delete(&EntityId::from("acc-1")).await;

        assert!(response.success);
        assert!(response.data["deleted_at"].is_null());
        let gone = repo.find_one(&EntityId::from("acc-1"), &Filter::new()).await.unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn restore_brings_a_soft_deleted_record_back() {
        let svc = service(repo());
        svc.create(json!({ "id": "acc-1", "name": "Acme" })).await;
        svc.delete(&EntityId::from("acc-1")).await;

        let response = svc.restore(&EntityId::from("acc-1")).await;

        assert!(response.success);
        assert!(response.data["deleted_at"].is_null());
    }

    #[tokio::test]
    async fn count_reports_live_records() {
        let svc = service(repo());
        svc.create(json!({ "name": "Acme" })).await;
        svc.create(json!({ "name": "Globex" })).await;

        let response = svc.count(&Filter::new()).await;

        assert_eq!(response.data, json!({ "count": 2 }));
    }

    #[tokio::test]
    async fn sync_requires_an_array() {
        let response = service(repo()).sync(json!({ "name": "Acme" })).await;

        assert!(!response.success);
        assert_eq!(response.status_code, 400);
    }

    #[tokio::test]
    async fn sync_twice_converges_to_one_row_per_id() {
        let repo = repo();
        let svc = service(Arc::clone(&repo));
        let batch = json!([
            { "id": "acc-1", "name": "Acme" },
            { "id": "acc-2", "name": "Globex" },
        ]);

        let first = svc.sync(batch.clone()).await;
        let second = svc.sync(batch).await;

        assert!(first.success);
        assert!(second.success);
        let live = repo.count(&Filter::new()).await.unwrap();
        assert_eq!(live, 2);
    }

    #[tokio::test]
    async fn replicate_created_twice_is_success() {
        let svc = service(repo());
        let payload = json!({ "id": "acc-1", "name": "Acme" });

        let first = svc.replicate_created(payload.clone()).await;
        let redelivery = svc.replicate_created(payload).await;

        assert!(first.success);
        assert!(redelivery.success);
        assert_eq!(redelivery.message, "account already replicated");
    }

    #[tokio::test]
    async fn replicate_updated_without_created_still_lands() {
        let repo = repo();
        let svc = service(Arc::clone(&repo));

        let response = svc
            .replicate_updated(json!({ "id": "acc-1", "name": "Acme" }))
            .await;

        assert!(response.success);
        let stored = repo.find_one(&EntityId::from("acc-1"), &Filter::new()).await.unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn replicate_deleted_of_an_absent_record_is_a_noop() {
        let response = service(repo())
            .replicate_deleted(json!({ "id": "nope" }))
            .await;

        assert!(response.success);
        assert_eq!(response.message, "account already absent");
    }

    #[tokio::test]
    async fn replicate_deleted_accepts_a_numeric_origin_id() {
        let svc = service(repo());
        svc.replicate_created(json!({ "id": 42, "name": "Acme" })).await;

        let response = svc.replicate_deleted(json!({ "id": 42 })).await;

        assert!(response.success);
        assert_eq!(response.data["id"], "42");
    }

    #[tokio::test]
    async fn trusted_replicas_skip_shape_validation() {
        let svc =
            EntityService::<Account>::new(repo()).with_shape(Arc::new(RequiredFields::new(&["email"])));

        let rejected = svc.create(json!({ "name": "Acme" })).await;
        let replicated = svc
            .replicate_created(json!({ "id": "acc-1", "name": "Acme" }))
            .await;

        assert!(!rejected.success);
        assert!(replicated.success);
    }

    #[tokio::test]
    async fn enforce_mode_validates_replica_payloads_too() {
        let svc = EntityService::<Account>::new(repo())
            .with_shape(Arc::new(RequiredFields::new(&["email"])))
            .with_validation(ReplicaValidation::Enforce);

        let response = svc
            .replicate_created(json!({ "id": "acc-1", "name": "Acme" }))
            .await;

        assert!(!response.success);
        assert_eq!(response.status_code, 400);
    }
}
