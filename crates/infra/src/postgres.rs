//! Postgres-backed generic repository.
//!
//! One implementation serves every entity: SQL is assembled from the
//! entity's static descriptor (table, typed columns, deletion strategy) and
//! all payload values travel as bound parameters. Column and table names
//! come exclusively from `'static` descriptor data, never from requests;
//! filter and sort column names are checked against the descriptor before
//! they reach the SQL text.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate id or unique column |
//! | Database (foreign key violation) | `23503` | `Conflict` | Referential integrity violation |
//! | Database (check constraint violation) | `23514` | `InvalidValue` | Value rejected by a CHECK |
//! | Database (other) | Any other | `Database` | Other database errors |
//! | RowNotFound | N/A | `NotFound` | Addressed row absent |
//! | Other | N/A | `Database` | Network errors, pool failures, etc. |

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{PgPool, Postgres, Row};
use tracing::instrument;

use vendhub_core::{EntityId, Record};
use vendhub_store::{
    ColumnKind, Direction, EntityDescriptor, Filter, FilterValue, ListQuery, Listing, Patch,
    Persistable, Repository, StoreError,
};

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// Descriptor-driven repository over a SQLx connection pool.
///
/// The pool handles connection management and is safe to share; the
/// repository itself holds no state beyond it, so cloning is cheap and
/// concurrent writes race at the database under its row-level guarantees.
#[derive(Debug, Clone)]
pub struct PostgresRepository<E> {
    pool: Arc<PgPool>,
    marker: PhantomData<fn() -> E>,
}

impl<E: Persistable> PostgresRepository<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            marker: PhantomData,
        }
    }

    pub fn with_pool(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            marker: PhantomData,
        }
    }

    /// Fetch child rows for every declared relation and attach them to the
    /// parent object. One level deep only.
    async fn attach_relations(&self, object: &mut Map<String, Value>) -> Result<(), StoreError> {
        let descriptor = E::descriptor();
        if descriptor.relations.is_empty() {
            return Ok(());
        }
        let Some(id) = object.get("id").and_then(Value::as_str).map(str::to_owned) else {
            return Ok(());
        };
        for relation in descriptor.relations {
            let target = relation.target;
            let mut sql = format!(
                "SELECT {} FROM {} WHERE {} = $1",
                select_list(target),
                target.table,
                relation.foreign_key,
            );
            if target.soft_delete() {
                sql.push_str(" AND deleted_at IS NULL");
            }
            sql.push_str(" ORDER BY created_at DESC, id ASC");

            let rows = sqlx::query(&sql)
                .bind(&id)
                .fetch_all(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("load_relation", e))?;
            let children = rows
                .iter()
                .map(|row| row_object(target, row).map(Value::Object))
                .collect::<Result<Vec<_>, _>>()?;
            object.insert(relation.field.to_owned(), Value::Array(children));
        }
        Ok(())
    }
}

#[async_trait]
impl<E: Persistable> Repository<E> for PostgresRepository<E> {
    #[instrument(skip_all, fields(table = E::descriptor().table), err)]
    async fn create(&self, record: E) -> Result<E, StoreError> {
        let descriptor = E::descriptor();
        let object = record_object(&record)?;

        let mut columns: Vec<&str> = vec!["id"];
        let mut binds = vec![SqlValue::Text(Some(record.id().as_str().to_owned()))];
        for column in descriptor.columns {
            let value = object.get(column.name).unwrap_or(&Value::Null);
            columns.push(column.name);
            binds.push(sql_value(column.kind, column.name, value)?);
        }
        columns.push("created_at");
        binds.push(SqlValue::Timestamp(Some(record.created_at())));
        columns.push("updated_at");
        binds.push(SqlValue::Timestamp(Some(record.updated_at())));
        if descriptor.soft_delete() {
            columns.push("deleted_at");
            binds.push(SqlValue::Timestamp(record.deleted_at()));
        }

        let placeholders: Vec<String> = (1..=binds.len()).map(|i| format!("${i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            descriptor.table,
            columns.join(", "),
            placeholders.join(", "),
            select_list(descriptor),
        );

        let row = bind_all(sqlx::query(&sql), binds)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create", e))?;
        decode_row::<E>(descriptor, &row)
    }

    #[instrument(skip_all, fields(table = E::descriptor().table), err)]
    async fn find_all(&self, query: &ListQuery) -> Result<Listing<E>, StoreError> {
        let descriptor = E::descriptor();
        if let Some(sort) = &query.sort {
            if !descriptor.addressable(&sort.column) {
                return Err(StoreError::UnknownColumn(sort.column.clone()));
            }
        }

        let mut binds = Vec::new();
        let where_sql = where_clause(
            descriptor,
            &query.filter,
            query.search.as_deref(),
            None,
            &mut binds,
        )?;

        let total = match query.window() {
            Some(_) => {
                let count_sql =
                    format!("SELECT COUNT(*) AS total FROM {}{}", descriptor.table, where_sql);
                let row = bind_all(sqlx::query(&count_sql), binds.clone())
                    .fetch_one(&*self.pool)
                    .await
                    .map_err(|e| map_sqlx_error("count", e))?;
                let total: i64 = row
                    .try_get("total")
                    .map_err(|e| StoreError::Codec(e.to_string()))?;
                Some(total as u64)
            }
            None => None,
        };

        let mut sql = format!(
            "SELECT {} FROM {}{}",
            select_list(descriptor),
            descriptor.table,
            where_sql,
        );
        match &query.sort {
            Some(sort) => {
                sql.push_str(&format!(" ORDER BY {} {}", sort.column, direction_sql(sort.direction)));
                if sort.column != "id" {
                    sql.push_str(", id ASC");
                }
            }
            None => sql.push_str(" ORDER BY created_at DESC, id ASC"),
        }
        if let Some((page, limit)) = query.window() {
            let offset = i64::from(page - 1) * i64::from(limit);
            binds.push(SqlValue::BigInt(Some(i64::from(limit))));
            sql.push_str(&format!(" LIMIT ${}", binds.len()));
            binds.push(SqlValue::BigInt(Some(offset)));
            sql.push_str(&format!(" OFFSET ${}", binds.len()));
        }

        let rows = bind_all(sqlx::query(&sql), binds)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_all", e))?;
        let mut data = Vec::with_capacity(rows.len());
        for row in &rows {
            data.push(decode_row::<E>(descriptor, row)?);
        }

        Ok(match (query.window(), total) {
            (Some((page, limit)), Some(total)) => Listing::paged(data, total, page, limit),
            _ => Listing::full(data),
        })
    }

    #[instrument(skip_all, fields(table = E::descriptor().table, id = %id))]
    async fn find_one(&self, id: &EntityId, filter: &Filter) -> Result<Option<E>, StoreError> {
        let descriptor = E::descriptor();
        let mut binds = Vec::new();
        let where_sql = where_clause(descriptor, filter, None, Some(id), &mut binds)?;
        let sql = format!(
            "SELECT {} FROM {}{} LIMIT 1",
            select_list(descriptor),
            descriptor.table,
            where_sql,
        );

        let row = bind_all(sqlx::query(&sql), binds)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_one", e))?;
        let Some(row) = row else { return Ok(None) };

        let mut object = row_object(descriptor, &row)?;
        self.attach_relations(&mut object).await?;
        Ok(Some(object_record(object)?))
    }

    #[instrument(skip_all, fields(table = E::descriptor().table, id = %id))]
    async fn update(&self, id: &EntityId, patch: Patch) -> Result<E, StoreError> {
        let descriptor = E::descriptor();
        let mut sets = Vec::new();
        let mut binds = Vec::new();
        for (key, value) in &patch {
            let Some(column) = descriptor.column(key) else {
                continue;
            };
            if !column.kind.admits(value) {
                return Err(StoreError::invalid_value(
                    column.name,
                    format!("does not fit {:?}", column.kind),
                ));
            }
            binds.push(sql_value(column.kind, column.name, value)?);
            sets.push(format!("{} = ${}", column.name, binds.len()));
        }
        sets.push("updated_at = NOW()".to_owned());

        binds.push(SqlValue::Text(Some(id.as_str().to_owned())));
        let mut sql = format!(
            "UPDATE {} SET {} WHERE id = ${}",
            descriptor.table,
            sets.join(", "),
            binds.len(),
        );
        if descriptor.soft_delete() {
            sql.push_str(" AND deleted_at IS NULL");
        }
        sql.push_str(&format!(" RETURNING {}", select_list(descriptor)));

        let row = bind_all(sqlx::query(&sql), binds)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update", e))?;
        match row {
            Some(row) => decode_row::<E>(descriptor, &row),
            None => Err(StoreError::NotFound),
        }
    }

    #[instrument(skip_all, fields(table = E::descriptor().table, id = %id))]
    async fn delete(&self, id: &EntityId) -> Result<E, StoreError> {
        let descriptor = E::descriptor();
        let sql = if descriptor.soft_delete() {
            format!(
                "UPDATE {} SET deleted_at = NOW(), updated_at = NOW() \
                 WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
                descriptor.table,
                select_list(descriptor),
            )
        } else {
            format!(
                "DELETE FROM {} WHERE id = $1 RETURNING {}",
                descriptor.table,
                select_list(descriptor),
            )
        };

        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;
        match row {
            Some(row) => decode_row::<E>(descriptor, &row),
            None => Err(StoreError::NotFound),
        }
    }

    #[instrument(skip_all, fields(table = E::descriptor().table, id = %id))]
    async fn restore(&self, id: &EntityId) -> Result<E, StoreError> {
        let descriptor = E::descriptor();
        if !descriptor.soft_delete() {
            return Err(StoreError::NotFound);
        }
        let sql = format!(
            "UPDATE {} SET deleted_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NOT NULL RETURNING {}",
            descriptor.table,
            select_list(descriptor),
        );

        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("restore", e))?;
        match row {
            Some(row) => decode_row::<E>(descriptor, &row),
            None => Err(StoreError::NotFound),
        }
    }

    #[instrument(skip_all, fields(table = E::descriptor().table), err)]
    async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        let descriptor = E::descriptor();
        let mut binds = Vec::new();
        let where_sql = where_clause(descriptor, filter, None, None, &mut binds)?;
        let sql = format!("SELECT COUNT(*) AS total FROM {}{}", descriptor.table, where_sql);

        let row = bind_all(sqlx::query(&sql), binds)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count", e))?;
        let total: i64 = row
            .try_get("total")
            .map_err(|e| StoreError::Codec(e.to_string()))?;
        Ok(total as u64)
    }

    #[instrument(skip_all, fields(table = E::descriptor().table, records = records.len()), err)]
    async fn sync(&self, records: Vec<E>) -> Result<Vec<E>, StoreError> {
        if records.is_empty() {
            return Ok(vec![]);
        }
        let descriptor = E::descriptor();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let mut synced = Vec::with_capacity(records.len());
        for record in records {
            let object = record_object(&record)?;

            let mut columns: Vec<&str> = vec!["id"];
            let mut binds = vec![SqlValue::Text(Some(record.id().as_str().to_owned()))];
            for column in descriptor.columns {
                let value = object.get(column.name).unwrap_or(&Value::Null);
                columns.push(column.name);
                binds.push(sql_value(column.kind, column.name, value)?);
            }
            columns.push("created_at");
            binds.push(SqlValue::Timestamp(Some(record.created_at())));
            if descriptor.soft_delete() {
                columns.push("deleted_at");
                binds.push(SqlValue::Timestamp(record.deleted_at()));
            }

            let mut placeholders: Vec<String> =
                (1..=binds.len()).map(|i| format!("${i}")).collect();
            columns.push("updated_at");
            placeholders.push("NOW()".to_owned());

            // Conflicting rows keep their created_at and deleted_at; only
            // the declared columns and updated_at move.
            let updates: Vec<String> = descriptor
                .columns
                .iter()
                .map(|c| format!("{} = EXCLUDED.{}", c.name, c.name))
                .chain(std::iter::once("updated_at = NOW()".to_owned()))
                .collect();

            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({}) \
                 ON CONFLICT (id) DO UPDATE SET {} RETURNING {}",
                descriptor.table,
                columns.join(", "),
                placeholders.join(", "),
                updates.join(", "),
                select_list(descriptor),
            );

            let row = bind_all(sqlx::query(&sql), binds)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("sync", e))?;
            synced.push(decode_row::<E>(descriptor, &row)?);
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(synced)
    }
}

/// Column list for SELECT/RETURNING, in descriptor order.
fn select_list(descriptor: &EntityDescriptor) -> String {
    let mut list = String::from("id");
    for column in descriptor.columns {
        list.push_str(", ");
        list.push_str(column.name);
    }
    list.push_str(", created_at, updated_at");
    if descriptor.soft_delete() {
        list.push_str(", deleted_at");
    }
    list
}

fn direction_sql(direction: Direction) -> &'static str {
    match direction {
        Direction::Asc => "ASC",
        Direction::Desc => "DESC",
    }
}

/// Owned, typed value ready to be bound to a placeholder.
#[derive(Debug, Clone)]
enum SqlValue {
    Text(Option<String>),
    BigInt(Option<i64>),
    Double(Option<f64>),
    Boolean(Option<bool>),
    Timestamp(Option<DateTime<Utc>>),
    Json(Option<Value>),
}

fn bind_all(query: PgQuery<'_>, binds: Vec<SqlValue>) -> PgQuery<'_> {
    binds.into_iter().fold(query, |query, bind| match bind {
        SqlValue::Text(v) => query.bind(v),
        SqlValue::BigInt(v) => query.bind(v),
        SqlValue::Double(v) => query.bind(v),
        SqlValue::Boolean(v) => query.bind(v),
        SqlValue::Timestamp(v) => query.bind(v),
        SqlValue::Json(v) => query.bind(v),
    })
}

/// JSON payload value to a typed bind for its column.
fn sql_value(kind: ColumnKind, column: &str, value: &Value) -> Result<SqlValue, StoreError> {
    if value.is_null() {
        return Ok(match kind {
            ColumnKind::Text => SqlValue::Text(None),
            ColumnKind::BigInt => SqlValue::BigInt(None),
            ColumnKind::Double => SqlValue::Double(None),
            ColumnKind::Boolean => SqlValue::Boolean(None),
            ColumnKind::Timestamp => SqlValue::Timestamp(None),
            ColumnKind::Json => SqlValue::Json(None),
        });
    }
    let bound = match kind {
        ColumnKind::Text => value.as_str().map(|s| SqlValue::Text(Some(s.to_owned()))),
        ColumnKind::BigInt => value.as_i64().map(|v| SqlValue::BigInt(Some(v))),
        ColumnKind::Double => value.as_f64().map(|v| SqlValue::Double(Some(v))),
        ColumnKind::Boolean => value.as_bool().map(|v| SqlValue::Boolean(Some(v))),
        ColumnKind::Timestamp => value
            .as_str()
            .and_then(|s| s.parse::<DateTime<Utc>>().ok())
            .map(|ts| SqlValue::Timestamp(Some(ts))),
        ColumnKind::Json => Some(SqlValue::Json(Some(value.clone()))),
    };
    bound.ok_or_else(|| StoreError::invalid_value(column, format!("does not fit {kind:?}")))
}

/// Kind of an addressable column, audit timestamps included.
fn column_kind(descriptor: &EntityDescriptor, name: &str) -> Option<ColumnKind> {
    match name {
        "id" => Some(ColumnKind::Text),
        "created_at" | "updated_at" => Some(ColumnKind::Timestamp),
        _ => descriptor.column(name).map(|c| c.kind),
    }
}

fn filter_bind(
    descriptor: &EntityDescriptor,
    column: &str,
    value: &FilterValue,
) -> Result<Option<SqlValue>, StoreError> {
    let kind = column_kind(descriptor, column)
        .ok_or_else(|| StoreError::UnknownColumn(column.to_owned()))?;
    let bound = match value {
        FilterValue::Null => return Ok(None),
        // Timestamps arrive as strings on the wire.
        FilterValue::Text(s) if kind == ColumnKind::Timestamp => {
            let ts = s
                .parse::<DateTime<Utc>>()
                .map_err(|e| StoreError::invalid_value(column, e.to_string()))?;
            SqlValue::Timestamp(Some(ts))
        }
        FilterValue::Text(s) => SqlValue::Text(Some(s.clone())),
        FilterValue::BigInt(v) => SqlValue::BigInt(Some(*v)),
        FilterValue::Double(v) => SqlValue::Double(Some(*v)),
        FilterValue::Boolean(v) => SqlValue::Boolean(Some(*v)),
    };
    Ok(Some(bound))
}

fn escape_like(needle: &str) -> String {
    needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Assemble the WHERE clause shared by reads: live-rows predicate, equality
/// filter, optional id, optional substring search. Returns `""` or a string
/// starting with `" WHERE "`; binds are appended in placeholder order.
fn where_clause(
    descriptor: &EntityDescriptor,
    filter: &Filter,
    search: Option<&str>,
    id: Option<&EntityId>,
    binds: &mut Vec<SqlValue>,
) -> Result<String, StoreError> {
    let mut conditions = Vec::new();

    if let Some(id) = id {
        binds.push(SqlValue::Text(Some(id.as_str().to_owned())));
        conditions.push(format!("id = ${}", binds.len()));
    }
    if descriptor.soft_delete() {
        conditions.push("deleted_at IS NULL".to_owned());
    }
    for (column, value) in filter.conditions() {
        if !descriptor.addressable(column) {
            return Err(StoreError::UnknownColumn(column.clone()));
        }
        match filter_bind(descriptor, column, value)? {
            Some(bound) => {
                binds.push(bound);
                conditions.push(format!("{} = ${}", column, binds.len()));
            }
            None => conditions.push(format!("{column} IS NULL")),
        }
    }
    if let Some(needle) = search {
        if !needle.is_empty() {
            let searchable: Vec<&str> = descriptor.searchable_columns().collect();
            if !searchable.is_empty() {
                binds.push(SqlValue::Text(Some(format!("%{}%", escape_like(needle)))));
                let param = binds.len();
                let clauses: Vec<String> = searchable
                    .iter()
                    .map(|c| format!(r"{c} ILIKE ${param} ESCAPE '\'"))
                    .collect();
                conditions.push(format!("({})", clauses.join(" OR ")));
            }
        }
    }

    if conditions.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" WHERE {}", conditions.join(" AND ")))
    }
}

/// Read one row back into the JSON object shape the entity deserializes
/// from. Relation fields are absent; entity structs default them.
fn row_object(descriptor: &EntityDescriptor, row: &PgRow) -> Result<Map<String, Value>, StoreError> {
    let mut object = Map::new();
    let id: String = row
        .try_get("id")
        .map_err(|e| StoreError::Codec(e.to_string()))?;
    object.insert("id".to_owned(), Value::String(id));

    for column in descriptor.columns {
        let value = match column.kind {
            ColumnKind::Text => row
                .try_get::<Option<String>, _>(column.name)
                .map(|v| v.map_or(Value::Null, Value::String)),
            ColumnKind::BigInt => row
                .try_get::<Option<i64>, _>(column.name)
                .map(|v| v.map_or(Value::Null, |v| json!(v))),
            ColumnKind::Double => row
                .try_get::<Option<f64>, _>(column.name)
                .map(|v| v.map_or(Value::Null, |v| json!(v))),
            ColumnKind::Boolean => row
                .try_get::<Option<bool>, _>(column.name)
                .map(|v| v.map_or(Value::Null, Value::Bool)),
            ColumnKind::Timestamp => row
                .try_get::<Option<DateTime<Utc>>, _>(column.name)
                .map(|v| v.map_or(Value::Null, |ts| json!(ts))),
            ColumnKind::Json => row
                .try_get::<Option<Value>, _>(column.name)
                .map(|v| v.unwrap_or(Value::Null)),
        }
        .map_err(|e| StoreError::Codec(format!("{}: {e}", column.name)))?;
        object.insert(column.name.to_owned(), value);
    }

    let created_at: DateTime<Utc> = row
        .try_get("created_at")
        .map_err(|e| StoreError::Codec(e.to_string()))?;
    object.insert("created_at".to_owned(), json!(created_at));
    let updated_at: DateTime<Utc> = row
        .try_get("updated_at")
        .map_err(|e| StoreError::Codec(e.to_string()))?;
    object.insert("updated_at".to_owned(), json!(updated_at));
    if descriptor.soft_delete() {
        let deleted_at: Option<DateTime<Utc>> = row
            .try_get("deleted_at")
            .map_err(|e| StoreError::Codec(e.to_string()))?;
        object.insert("deleted_at".to_owned(), json!(deleted_at));
    }

    Ok(object)
}

fn decode_row<E: Persistable>(descriptor: &EntityDescriptor, row: &PgRow) -> Result<E, StoreError> {
    object_record(row_object(descriptor, row)?)
}

fn object_record<E: Persistable>(object: Map<String, Value>) -> Result<E, StoreError> {
    serde_json::from_value(Value::Object(object)).map_err(|e| StoreError::Codec(e.to_string()))
}

fn record_object<E: Persistable>(record: &E) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(record).map_err(|e| StoreError::Codec(e.to_string()))? {
        Value::Object(object) => Ok(object),
        other => Err(StoreError::Codec(format!(
            "record serialized to {other}, expected an object"
        ))),
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_owned();
            let field = constraint_field(db_err.constraint());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::conflict(field, "already exists"),
                Some("23503") => StoreError::conflict(field, message),
                Some("23514") => StoreError::invalid_value(field, message),
                _ => StoreError::Database(format!("{operation}: {message}")),
            }
        }
        other => StoreError::Database(format!("{operation}: {other}")),
    }
}

/// Best-effort field name from a Postgres constraint name, which by
/// convention looks like `<table>_<column>_key` / `_fkey` / `_check`.
fn constraint_field(constraint: Option<&str>) -> String {
    let Some(constraint) = constraint else {
        return "id".to_owned();
    };
    if constraint.ends_with("_pkey") || constraint == "pkey" {
        return "id".to_owned();
    }
    let trimmed = constraint
        .trim_end_matches("_key")
        .trim_end_matches("_fkey")
        .trim_end_matches("_check");
    let field = match trimmed.split_once('_') {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => trimmed,
    };
    if field.is_empty() {
        "id".to_owned()
    } else {
        field.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use vendhub_directory::account::ACCOUNT;
    use vendhub_directory::company::COMPANY;

    #[test]
    fn select_list_follows_the_descriptor() {
        let list = select_list(&ACCOUNT);

        assert!(list.starts_with("id, "));
        assert!(list.contains("name"));
        assert!(list.ends_with("created_at, updated_at, deleted_at"));
    }

    #[test]
    fn where_clause_numbers_placeholders_in_order() {
        let filter = Filter::new().eq("status", "active").eq("name", "Acme");
        let mut binds = Vec::new();

        let sql = where_clause(&ACCOUNT, &filter, Some("acm"), None, &mut binds).unwrap();

        assert!(sql.starts_with(" WHERE deleted_at IS NULL"));
        assert!(sql.contains("status = $1"));
        assert!(sql.contains("name = $2"));
        assert!(sql.contains("ILIKE $3"));
        assert_eq!(binds.len(), 3);
    }

    #[test]
    fn unknown_filter_column_is_rejected_before_sql() {
        let filter = Filter::new().eq("password", "x");
        let mut binds = Vec::new();

        let err = where_clause(&ACCOUNT, &filter, None, None, &mut binds).unwrap_err();

        assert!(matches!(err, StoreError::UnknownColumn(c) if c == "password"));
    }

    #[test]
    fn search_needle_wildcards_are_escaped() {
        assert_eq!(escape_like("100%_a\\b"), "100\\%\\_a\\\\b");
    }

    #[test]
    fn constraint_names_reduce_to_fields() {
        assert_eq!(constraint_field(Some("accounts_email_key")), "email");
        assert_eq!(constraint_field(Some("prices_product_id_fkey")), "product_id");
        assert_eq!(constraint_field(Some("payouts_pkey")), "id");
        assert_eq!(constraint_field(None), "id");
    }

    #[test]
    fn relations_do_not_leak_into_the_select_list() {
        let list = select_list(&COMPANY);

        assert!(!list.contains("stores"));
    }

    #[test]
    fn audit_columns_stay_addressable_for_sorting() {
        assert!(ACCOUNT.addressable("created_at"));
        assert!(ACCOUNT.addressable("name"));
        assert!(!ACCOUNT.addressable("stores"));
        assert!(!ACCOUNT.addressable("deleted_at"));
    }
}
