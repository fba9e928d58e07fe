//! Static entity descriptors.
//!
//! Each replicated entity declares its storage shape once, as a `'static`
//! descriptor: table name, typed columns, deletion strategy and eager-loaded
//! relations. The generic repository is driven entirely by this metadata, so
//! adding an entity means writing a struct and a descriptor, never a new
//! repository.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use vendhub_core::Record;

/// Storage type of a column, used to keep JSON payload values and SQL
/// parameters aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    BigInt,
    Double,
    Boolean,
    Timestamp,
    Json,
}

impl ColumnKind {
    /// Whether a JSON payload value can inhabit this column. Null is always
    /// admitted: nullability is the store's concern, not the codec's.
    pub fn admits(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            Self::Text => value.is_string(),
            Self::BigInt => value.as_i64().is_some(),
            Self::Double => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Timestamp => value
                .as_str()
                .is_some_and(|s| s.parse::<DateTime<Utc>>().is_ok()),
            Self::Json => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

/// What `delete` means for an entity.
///
/// `Soft` stamps `deleted_at` and keeps the row; `Hard` removes it. Tables
/// for hard-deleted entities do not have a `deleted_at` column at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionStrategy {
    Soft,
    Hard,
}

/// A child collection loaded eagerly with the parent.
///
/// `field` is the JSON field the children land in, `target` describes their
/// table and `foreign_key` is the child column pointing at the parent id.
/// Loading is one level deep: a child's own relations are not followed.
#[derive(Debug, Clone, Copy)]
pub struct Relation {
    pub field: &'static str,
    pub foreign_key: &'static str,
    pub target: &'static EntityDescriptor,
}

#[derive(Debug)]
pub struct EntityDescriptor {
    /// Routing-key domain, e.g. `account` for `account.created`.
    pub domain: &'static str,
    pub table: &'static str,
    pub columns: &'static [Column],
    pub deletion: DeletionStrategy,
    pub relations: &'static [Relation],
}

impl EntityDescriptor {
    pub fn soft_delete(&self) -> bool {
        matches!(self.deletion, DeletionStrategy::Soft)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns included in substring search: text columns that are not
    /// identifiers or identifier references.
    pub fn searchable_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Text && !c.name.contains("id"))
            .map(|c| c.name)
    }

    /// Whether `name` may appear in filters and sort clauses.
    pub fn addressable(&self, name: &str) -> bool {
        name == "id" || name == "created_at" || name == "updated_at" || self.column(name).is_some()
    }
}

/// A record the generic repository can persist.
///
/// The serde bounds let the repository move records through JSON objects in
/// both directions; the descriptor tells it which fields are columns.
pub trait Persistable: Record + Serialize + DeserializeOwned {
    fn descriptor() -> &'static EntityDescriptor;
}

#[cfg(test)]
mod tests {
    use super::*;

    static SPECIMEN: EntityDescriptor = EntityDescriptor {
        domain: "specimen",
        table: "specimens",
        columns: &[
            Column { name: "name", kind: ColumnKind::Text },
            Column { name: "external_id", kind: ColumnKind::Text },
            Column { name: "grade", kind: ColumnKind::BigInt },
            Column { name: "notes", kind: ColumnKind::Text },
        ],
        deletion: DeletionStrategy::Soft,
        relations: &[],
    };

    #[test]
    fn search_skips_identifier_like_text_columns() {
        let searchable: Vec<&str> = SPECIMEN.searchable_columns().collect();
        assert_eq!(searchable, vec!["name", "notes"]);
    }

    #[test]
    fn audit_columns_are_addressable_without_being_declared() {
        assert!(SPECIMEN.addressable("id"));
        assert!(SPECIMEN.addressable("created_at"));
        assert!(SPECIMEN.addressable("grade"));
        assert!(!SPECIMEN.addressable("unknown"));
        assert!(!SPECIMEN.addressable("deleted_at"));
    }
}
