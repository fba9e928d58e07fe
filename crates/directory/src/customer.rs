use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vendhub_core::EntityId;
use vendhub_store::{Column, ColumnKind, DeletionStrategy, EntityDescriptor, Persistable};

/// Replica of an end customer of the vending platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub loyalty_points: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

pub static CUSTOMER: EntityDescriptor = EntityDescriptor {
    domain: "customer",
    table: "customers",
    columns: &[
        Column { name: "name", kind: ColumnKind::Text },
        Column { name: "email", kind: ColumnKind::Text },
        Column { name: "phone", kind: ColumnKind::Text },
        Column { name: "account_id", kind: ColumnKind::Text },
        Column { name: "loyalty_points", kind: ColumnKind::BigInt },
        Column { name: "status", kind: ColumnKind::Text },
    ],
    deletion: DeletionStrategy::Soft,
    relations: &[],
};

vendhub_core::record_audit!(Customer, soft);

impl Persistable for Customer {
    fn descriptor() -> &'static EntityDescriptor {
        &CUSTOMER
    }
}
