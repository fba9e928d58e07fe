use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vendhub_core::EntityId;
use vendhub_store::{Column, ColumnKind, DeletionStrategy, EntityDescriptor, Persistable};

/// Replica of a promotional or refund voucher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: EntityId,
    pub code: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

pub static VOUCHER: EntityDescriptor = EntityDescriptor {
    domain: "voucher",
    table: "vouchers",
    columns: &[
        Column { name: "code", kind: ColumnKind::Text },
        Column { name: "amount", kind: ColumnKind::BigInt },
        Column { name: "currency", kind: ColumnKind::Text },
        Column { name: "customer_id", kind: ColumnKind::Text },
        Column { name: "status", kind: ColumnKind::Text },
        Column { name: "expires_at", kind: ColumnKind::Timestamp },
    ],
    deletion: DeletionStrategy::Soft,
    relations: &[],
};

vendhub_core::record_audit!(Voucher, soft);

impl Persistable for Voucher {
    fn descriptor() -> &'static EntityDescriptor {
        &VOUCHER
    }
}
