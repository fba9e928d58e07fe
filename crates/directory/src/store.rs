use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vendhub_core::EntityId;
use vendhub_store::{Column, ColumnKind, DeletionStrategy, EntityDescriptor, Persistable};

/// Replica of a physical store / site where machines operate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

pub static STORE: EntityDescriptor = EntityDescriptor {
    domain: "store",
    table: "stores",
    columns: &[
        Column { name: "name", kind: ColumnKind::Text },
        Column { name: "company_id", kind: ColumnKind::Text },
        Column { name: "account_id", kind: ColumnKind::Text },
        Column { name: "address", kind: ColumnKind::Text },
        Column { name: "city", kind: ColumnKind::Text },
        Column { name: "latitude", kind: ColumnKind::Double },
        Column { name: "longitude", kind: ColumnKind::Double },
        Column { name: "status", kind: ColumnKind::Text },
    ],
    deletion: DeletionStrategy::Soft,
    relations: &[],
};

vendhub_core::record_audit!(Store, soft);

impl Persistable for Store {
    fn descriptor() -> &'static EntityDescriptor {
        &STORE
    }
}
