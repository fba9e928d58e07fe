use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vendhub_core::EntityId;
use vendhub_store::{Column, ColumnKind, DeletionStrategy, EntityDescriptor, Persistable};

/// Replica of a product type (snack, drink, ...). Published upstream under
/// the bare `type.*` topics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductType {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

pub static PRODUCT_TYPE: EntityDescriptor = EntityDescriptor {
    domain: "type",
    table: "product_types",
    columns: &[
        Column { name: "name", kind: ColumnKind::Text },
        Column { name: "description", kind: ColumnKind::Text },
    ],
    deletion: DeletionStrategy::Soft,
    relations: &[],
};

vendhub_core::record_audit!(ProductType, soft);

impl Persistable for ProductType {
    fn descriptor() -> &'static EntityDescriptor {
        &PRODUCT_TYPE
    }
}
