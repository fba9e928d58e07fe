use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use vendhub_core::EntityId;
use vendhub_store::{Column, ColumnKind, DeletionStrategy, EntityDescriptor, Persistable};

/// Replica of a sale transaction recorded at a machine. Amounts are minor
/// units (cents).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: EntityId,
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub store_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub meta: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

pub static TRANSACTION: EntityDescriptor = EntityDescriptor {
    domain: "transaction",
    table: "transactions",
    columns: &[
        Column { name: "amount", kind: ColumnKind::BigInt },
        Column { name: "currency", kind: ColumnKind::Text },
        Column { name: "store_id", kind: ColumnKind::Text },
        Column { name: "product_id", kind: ColumnKind::Text },
        Column { name: "customer_id", kind: ColumnKind::Text },
        Column { name: "method", kind: ColumnKind::Text },
        Column { name: "status", kind: ColumnKind::Text },
        Column { name: "occurred_at", kind: ColumnKind::Timestamp },
        Column { name: "meta", kind: ColumnKind::Json },
    ],
    deletion: DeletionStrategy::Soft,
    relations: &[],
};

vendhub_core::record_audit!(Transaction, soft);

impl Persistable for Transaction {
    fn descriptor() -> &'static EntityDescriptor {
        &TRANSACTION
    }
}
