use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vendhub_core::EntityId;
use vendhub_store::{Column, ColumnKind, DeletionStrategy, EntityDescriptor, Persistable};

/// Replica of a product category node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub position: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

pub static CATEGORY: EntityDescriptor = EntityDescriptor {
    domain: "category",
    table: "categories",
    columns: &[
        Column { name: "name", kind: ColumnKind::Text },
        Column { name: "description", kind: ColumnKind::Text },
        Column { name: "parent_id", kind: ColumnKind::Text },
        Column { name: "position", kind: ColumnKind::BigInt },
    ],
    deletion: DeletionStrategy::Soft,
    relations: &[],
};

vendhub_core::record_audit!(Category, soft);

impl Persistable for Category {
    fn descriptor() -> &'static EntityDescriptor {
        &CATEGORY
    }
}
