use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use vendhub_core::EntityId;
use vendhub_store::{Column, ColumnKind, DeletionStrategy, EntityDescriptor, Persistable};

/// Replica of a machine service operation (refill, maintenance, collection).
///
/// Operations are transient work log entries: deleting one removes the row
/// outright, so the table carries no `deleted_at` column and `restore` has
/// nothing to bring back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: EntityId,
    pub kind: String,
    #[serde(default)]
    pub store_id: Option<String>,
    #[serde(default)]
    pub machine_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub meta: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub static OPERATION: EntityDescriptor = EntityDescriptor {
    domain: "operation",
    table: "operations",
    columns: &[
        Column { name: "kind", kind: ColumnKind::Text },
        Column { name: "store_id", kind: ColumnKind::Text },
        Column { name: "machine_id", kind: ColumnKind::Text },
        Column { name: "status", kind: ColumnKind::Text },
        Column { name: "occurred_at", kind: ColumnKind::Timestamp },
        Column { name: "meta", kind: ColumnKind::Json },
    ],
    deletion: DeletionStrategy::Hard,
    relations: &[],
};

vendhub_core::record_audit!(Operation);

impl Persistable for Operation {
    fn descriptor() -> &'static EntityDescriptor {
        &OPERATION
    }
}
