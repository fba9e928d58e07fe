use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vendhub_core::EntityId;
use vendhub_store::{
    Column, ColumnKind, DeletionStrategy, EntityDescriptor, Persistable, Relation,
};

use crate::store::{STORE, Store};

/// Replica of an operating company. Lists its stores eagerly so command
/// callers get the whole branch in one read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Eager-loaded children; never part of the companies table itself.
    #[serde(default)]
    pub stores: Vec<Store>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

pub static COMPANY: EntityDescriptor = EntityDescriptor {
    domain: "company",
    table: "companies",
    columns: &[
        Column { name: "name", kind: ColumnKind::Text },
        Column { name: "account_id", kind: ColumnKind::Text },
        Column { name: "tax_id", kind: ColumnKind::Text },
        Column { name: "status", kind: ColumnKind::Text },
    ],
    deletion: DeletionStrategy::Soft,
    relations: &[Relation {
        field: "stores",
        foreign_key: "company_id",
        target: &STORE,
    }],
};

vendhub_core::record_audit!(Company, soft);

impl Persistable for Company {
    fn descriptor() -> &'static EntityDescriptor {
        &COMPANY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stores_default_to_empty_when_not_loaded() {
        let company: Company = serde_json::from_value(json!({
            "id": "co-7",
            "name": "Snackline AG",
            "created_at": "2026-02-01T08:00:00Z",
            "updated_at": "2026-02-01T08:00:00Z",
        }))
        .unwrap();
        assert!(company.stores.is_empty());
    }

    #[test]
    fn relation_points_children_back_at_the_parent_column() {
        let relation = &COMPANY.relations[0];
        assert_eq!(relation.field, "stores");
        assert_eq!(relation.target.table, "stores");
        assert!(relation.target.column(relation.foreign_key).is_some());
    }
}
