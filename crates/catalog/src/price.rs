use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vendhub_core::EntityId;
use vendhub_store::{Column, ColumnKind, DeletionStrategy, EntityDescriptor, Persistable};

/// Replica of a product price at a store. Amounts are minor units (cents).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub id: EntityId,
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub store_id: Option<String>,
    #[serde(default)]
    pub effective_from: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

pub static PRICE: EntityDescriptor = EntityDescriptor {
    domain: "price",
    table: "prices",
    columns: &[
        Column { name: "amount", kind: ColumnKind::BigInt },
        Column { name: "currency", kind: ColumnKind::Text },
        Column { name: "product_id", kind: ColumnKind::Text },
        Column { name: "store_id", kind: ColumnKind::Text },
        Column { name: "effective_from", kind: ColumnKind::Timestamp },
    ],
    deletion: DeletionStrategy::Soft,
    relations: &[],
};

vendhub_core::record_audit!(Price, soft);

impl Persistable for Price {
    fn descriptor() -> &'static EntityDescriptor {
        &PRICE
    }
}
