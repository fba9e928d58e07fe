//! In-memory repository for tests/dev.

use std::cmp::Ordering;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};

use vendhub_core::{EntityId, Record};

use crate::descriptor::Persistable;
use crate::error::StoreError;
use crate::query::{Direction, Filter, ListQuery, Listing};
use crate::repository::{Patch, Repository};

/// In-memory [`Repository`] with the same visible semantics as the SQL one,
/// minus eager relation loading. Rows keep insertion order; listing order is
/// newest-first like the SQL default.
#[derive(Debug)]
pub struct InMemoryRepository<E> {
    rows: RwLock<Vec<E>>,
}

impl<E> InMemoryRepository<E> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }
}

impl<E> Default for InMemoryRepository<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Persistable> InMemoryRepository<E> {
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<E>> {
        match self.rows.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<E>> {
        match self.rows.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn visible(record: &E) -> bool {
        !E::descriptor().soft_delete() || record.deleted_at().is_none()
    }

    fn check_addressable(filter: &Filter) -> Result<(), StoreError> {
        for (column, _) in filter.conditions() {
            if !E::descriptor().addressable(column) {
                return Err(StoreError::UnknownColumn(column.clone()));
            }
        }
        Ok(())
    }

    fn matches(record: &E, filter: &Filter) -> Result<bool, StoreError> {
        if filter.is_empty() {
            return Ok(true);
        }
        let object = as_object(record)?;
        Ok(filter.conditions().iter().all(|(column, expected)| {
            object.get(column.as_str()).unwrap_or(&Value::Null) == &expected.as_json()
        }))
    }

    fn search_hit(record: &E, needle: &str) -> Result<bool, StoreError> {
        let object = as_object(record)?;
        let needle = needle.to_lowercase();
        Ok(E::descriptor().searchable_columns().any(|column| {
            object
                .get(column)
                .and_then(Value::as_str)
                .is_some_and(|text| text.to_lowercase().contains(&needle))
        }))
    }
}

fn as_object<E: Persistable>(record: &E) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(other) => Err(StoreError::Codec(format!(
            "record serialized to {other:?}, expected an object"
        ))),
        Err(err) => Err(StoreError::Codec(err.to_string())),
    }
}

fn from_object<E: Persistable>(object: Map<String, Value>) -> Result<E, StoreError> {
    serde_json::from_value(Value::Object(object)).map_err(|err| StoreError::Codec(err.to_string()))
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            _ => 4,
        }
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[async_trait]
impl<E: Persistable> Repository<E> for InMemoryRepository<E> {
    async fn create(&self, record: E) -> Result<E, StoreError> {
        let mut rows = self.write();
        if rows.iter().any(|r| r.id() == record.id()) {
            return Err(StoreError::conflict(
                "id",
                format!("id `{}` already exists", record.id()),
            ));
        }
        rows.push(record.clone());
        Ok(record)
    }

    async fn find_all(&self, query: &ListQuery) -> Result<Listing<E>, StoreError> {
        Self::check_addressable(&query.filter)?;
        if let Some(sort) = &query.sort {
            if !E::descriptor().addressable(&sort.column) {
                return Err(StoreError::UnknownColumn(sort.column.clone()));
            }
        }

        let rows = self.read();
        let mut matched: Vec<E> = Vec::new();
        for record in rows.iter().filter(|r| Self::visible(r)) {
            if !Self::matches(record, &query.filter)? {
                continue;
            }
            if let Some(needle) = &query.search {
                if !Self::search_hit(record, needle)? {
                    continue;
                }
            }
            matched.push(record.clone());
        }
        drop(rows);

        match &query.sort {
            Some(sort) => {
                let mut keyed: Vec<(Value, E)> = matched
                    .into_iter()
                    .map(|r| {
                        let key = as_object(&r)
                            .map(|o| o.get(&sort.column).cloned().unwrap_or(Value::Null))?;
                        Ok((key, r))
                    })
                    .collect::<Result<_, StoreError>>()?;
                keyed.sort_by(|(a, _), (b, _)| match sort.direction {
                    Direction::Asc => compare_values(a, b),
                    Direction::Desc => compare_values(b, a),
                });
                matched = keyed.into_iter().map(|(_, r)| r).collect();
            }
            None => {
                // Newest first, matching the SQL default.
                matched.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
            }
        }

        Ok(match query.window() {
            Some((page, limit)) => {
                let total = matched.len() as u64;
                let skip = ((page - 1) * limit) as usize;
                let data = matched.into_iter().skip(skip).take(limit as usize).collect();
                Listing::paged(data, total, page, limit)
            }
            None => Listing::full(matched),
        })
    }

    async fn find_one(&self, id: &EntityId, filter: &Filter) -> Result<Option<E>, StoreError> {
        Self::check_addressable(filter)?;
        let rows = self.read();
        for record in rows.iter() {
            if record.id() == id && Self::visible(record) && Self::matches(record, filter)? {
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }

    async fn update(&self, id: &EntityId, patch: Patch) -> Result<E, StoreError> {
        let mut rows = self.write();
        let idx = rows
            .iter()
            .position(|r| r.id() == id && Self::visible(r))
            .ok_or(StoreError::NotFound)?;

        let mut object = as_object(&rows[idx])?;
        for (key, value) in &patch {
            let Some(column) = E::descriptor().column(key) else {
                continue;
            };
            if !column.kind.admits(value) {
                return Err(StoreError::invalid_value(
                    key.clone(),
                    format!("does not fit column kind {:?}", column.kind),
                ));
            }
            object.insert(key.clone(), value.clone());
        }
        let mut updated: E = from_object(object)?;
        updated.set_updated_at(Utc::now());
        rows[idx] = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: &EntityId) -> Result<E, StoreError> {
        let mut rows = self.write();
        let idx = rows
            .iter()
            .position(|r| r.id() == id && Self::visible(r))
            .ok_or(StoreError::NotFound)?;
        if E::descriptor().soft_delete() {
            let now = Utc::now();
            rows[idx].set_deleted_at(Some(now));
            rows[idx].set_updated_at(now);
            Ok(rows[idx].clone())
        } else {
            Ok(rows.remove(idx))
        }
    }

    async fn restore(&self, id: &EntityId) -> Result<E, StoreError> {
        if !E::descriptor().soft_delete() {
            return Err(StoreError::NotFound);
        }
        let mut rows = self.write();
        let idx = rows
            .iter()
            .position(|r| r.id() == id && r.deleted_at().is_some())
            .ok_or(StoreError::NotFound)?;
        let now = Utc::now();
        rows[idx].set_deleted_at(None);
        rows[idx].set_updated_at(now);
        Ok(rows[idx].clone())
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        Self::check_addressable(filter)?;
        let rows = self.read();
        let mut total = 0u64;
        for record in rows.iter().filter(|r| Self::visible(r)) {
            if Self::matches(record, filter)? {
                total += 1;
            }
        }
        Ok(total)
    }

    async fn sync(&self, records: Vec<E>) -> Result<Vec<E>, StoreError> {
        let mut rows = self.write();
        let now = Utc::now();
        let mut out = Vec::with_capacity(records.len());
        for mut record in records {
            match rows.iter().position(|r| r.id() == record.id()) {
                Some(idx) => {
                    // Column values come from the incoming record; the
                    // stored audit trail wins for created_at and deleted_at.
                    record.set_created_at(rows[idx].created_at());
                    record.set_deleted_at(rows[idx].deleted_at());
                    record.set_updated_at(now);
                    rows[idx] = record.clone();
                }
                None => {
                    record.set_updated_at(now);
                    rows.push(record.clone());
                }
            }
            out.push(record);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use vendhub_core::EntityId;

    use super::*;
    use crate::descriptor::{Column, ColumnKind, DeletionStrategy, EntityDescriptor};
    use crate::query::Sort;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Gadget {
        id: EntityId,
        name: String,
        #[serde(default)]
        external_id: Option<String>,
        #[serde(default)]
        grade: Option<i64>,
        #[serde(default)]
        active: Option<bool>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        #[serde(default)]
        deleted_at: Option<DateTime<Utc>>,
    }

    static GADGET: EntityDescriptor = EntityDescriptor {
        domain: "gadget",
        table: "gadgets",
        columns: &[
            Column { name: "name", kind: ColumnKind::Text },
            Column { name: "external_id", kind: ColumnKind::Text },
            Column { name: "grade", kind: ColumnKind::BigInt },
            Column { name: "active", kind: ColumnKind::Boolean },
        ],
        deletion: DeletionStrategy::Soft,
        relations: &[],
    };

    vendhub_core::record_audit!(Gadget, soft);

    impl Persistable for Gadget {
        fn descriptor() -> &'static EntityDescriptor {
            &GADGET
        }
    }

    fn gadget(id: &str, name: &str, grade: i64) -> Gadget {
        let at = Utc::now();
        Gadget {
            id: EntityId::from(id),
            name: name.to_owned(),
            external_id: Some(format!("ext-{id}")),
            grade: Some(grade),
            active: Some(true),
            created_at: at,
            updated_at: at,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn create_then_find_one() {
        let repo = InMemoryRepository::new();
        repo.create(gadget("g-1", "drill", 3)).await.unwrap();
        let found = repo
            .find_one(&EntityId::from("g-1"), &Filter::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "drill");
    }

    #[tokio::test]
    async fn duplicate_id_is_a_conflict() {
        let repo = InMemoryRepository::new();
        repo.create(gadget("g-1", "drill", 3)).await.unwrap();
        let err = repo.create(gadget("g-1", "saw", 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { ref field, .. } if field == "id"));
    }

    #[tokio::test]
    async fn soft_delete_hides_until_restore() {
        let repo = InMemoryRepository::new();
        repo.create(gadget("g-1", "drill", 3)).await.unwrap();
        let deleted = repo.delete(&EntityId::from("g-1")).await.unwrap();
        assert!(deleted.deleted_at.is_some());

        let id = EntityId::from("g-1");
        assert!(repo.find_one(&id, &Filter::new()).await.unwrap().is_none());
        assert_eq!(repo.count(&Filter::new()).await.unwrap(), 0);
        assert!(matches!(
            repo.update(&id, Patch::new()).await,
            Err(StoreError::NotFound)
        ));

        let restored = repo.restore(&id).await.unwrap();
        assert!(restored.deleted_at.is_none());
        assert!(repo.find_one(&id, &Filter::new()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_patches_known_columns_only() {
        let repo = InMemoryRepository::new();
        let before = repo.create(gadget("g-1", "drill", 3)).await.unwrap();

        let patch: Patch = serde_json::from_value(json!({
            "name": "impact drill",
            "grade": 5,
            "id": "hijacked",
            "made_up": true,
        }))
        .unwrap();
        let after = repo.update(&EntityId::from("g-1"), patch).await.unwrap();

        assert_eq!(after.name, "impact drill");
        assert_eq!(after.grade, Some(5));
        assert_eq!(after.id.as_str(), "g-1");
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at >= before.updated_at);
    }

    #[tokio::test]
    async fn update_rejects_values_that_do_not_fit_the_column() {
        let repo = InMemoryRepository::new();
        repo.create(gadget("g-1", "drill", 3)).await.unwrap();
        let patch: Patch = serde_json::from_value(json!({"grade": "high"})).unwrap();
        let err = repo.update(&EntityId::from("g-1"), patch).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidValue { ref column, .. } if column == "grade"));
    }

    #[tokio::test]
    async fn listing_paginates_and_reports_totals() {
        let repo = InMemoryRepository::new();
        for i in 0..7 {
            repo.create(gadget(&format!("g-{i}"), &format!("tool {i}"), i))
                .await
                .unwrap();
        }

        let full = repo.find_all(&ListQuery::new()).await.unwrap();
        assert_eq!(full.data.len(), 7);
        assert!(full.meta.is_none());

        let page = repo
            .find_all(&ListQuery::new().page(3).limit(3))
            .await
            .unwrap();
        assert_eq!(page.data.len(), 1);
        let meta = page.meta.unwrap();
        assert_eq!(meta.total, 7);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(meta.page, 3);
    }

    #[tokio::test]
    async fn search_covers_text_columns_but_not_identifiers() {
        let repo = InMemoryRepository::new();
        repo.create(gadget("g-1", "angle grinder", 3)).await.unwrap();
        repo.create(gadget("g-2", "drill", 2)).await.unwrap();

        let hits = repo
            .find_all(&ListQuery::new().search("GRIND"))
            .await
            .unwrap();
        assert_eq!(hits.data.len(), 1);
        assert_eq!(hits.data[0].id.as_str(), "g-1");

        // `external_id` is ext-g-2 for the drill; identifier-like columns are
        // excluded from search.
        let misses = repo.find_all(&ListQuery::new().search("ext-g-2")).await.unwrap();
        assert!(misses.data.is_empty());
    }

    #[tokio::test]
    async fn explicit_sort_orders_by_column() {
        let repo = InMemoryRepository::new();
        repo.create(gadget("g-1", "b-tool", 2)).await.unwrap();
        repo.create(gadget("g-2", "a-tool", 9)).await.unwrap();
        repo.create(gadget("g-3", "c-tool", 4)).await.unwrap();

        let by_name = repo
            .find_all(&ListQuery::new().sort(Sort::asc("name")))
            .await
            .unwrap();
        let names: Vec<&str> = by_name.data.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["a-tool", "b-tool", "c-tool"]);

        let by_grade = repo
            .find_all(&ListQuery::new().sort(Sort::desc("grade")))
            .await
            .unwrap();
        assert_eq!(by_grade.data[0].grade, Some(9));
    }

    #[tokio::test]
    async fn filters_reject_undeclared_columns() {
        let repo: InMemoryRepository<Gadget> = InMemoryRepository::new();
        let err = repo
            .find_all(&ListQuery::new().filter(Filter::new().eq("made_up", "x")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn(_)));
    }

    #[tokio::test]
    async fn sync_inserts_missing_and_overwrites_existing() {
        let repo = InMemoryRepository::new();
        let original = repo.create(gadget("g-1", "drill", 3)).await.unwrap();

        let mut incoming = gadget("g-1", "hammer drill", 4);
        incoming.created_at = Utc::now(); // origin clock differs; stored wins
        let batch = vec![incoming, gadget("g-2", "saw", 1)];

        let synced = repo.sync(batch.clone()).await.unwrap();
        assert_eq!(synced.len(), 2);
        assert_eq!(synced[0].name, "hammer drill");
        assert_eq!(synced[0].created_at, original.created_at);
        assert_eq!(repo.count(&Filter::new()).await.unwrap(), 2);

        // Second run converges to the same state.
        let again = repo.sync(batch).await.unwrap();
        assert_eq!(again[0].name, "hammer drill");
        assert_eq!(again[0].created_at, original.created_at);
        assert_eq!(repo.count(&Filter::new()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn sync_leaves_deleted_rows_deleted() {
        let repo = InMemoryRepository::new();
        repo.create(gadget("g-1", "drill", 3)).await.unwrap();
        repo.delete(&EntityId::from("g-1")).await.unwrap();

        repo.sync(vec![gadget("g-1", "renamed drill", 5)]).await.unwrap();

        let id = EntityId::from("g-1");
        assert!(repo.find_one(&id, &Filter::new()).await.unwrap().is_none());
        let restored = repo.restore(&id).await.unwrap();
        assert_eq!(restored.name, "renamed drill");
    }

    #[tokio::test]
    async fn count_applies_filters() {
        let repo = InMemoryRepository::new();
        repo.create(gadget("g-1", "drill", 3)).await.unwrap();
        repo.create(gadget("g-2", "saw", 3)).await.unwrap();
        repo.create(gadget("g-3", "plane", 7)).await.unwrap();

        let filtered = repo.count(&Filter::new().eq("grade", 3)).await.unwrap();
        assert_eq!(filtered, 2);
    }
}
