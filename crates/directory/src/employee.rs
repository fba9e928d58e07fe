use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vendhub_core::EntityId;
use vendhub_store::{Column, ColumnKind, DeletionStrategy, EntityDescriptor, Persistable};

/// Replica of a platform user working for an account. The upstream identity
/// service publishes these under the `user.*` topics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub store_id: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

pub static EMPLOYEE: EntityDescriptor = EntityDescriptor {
    domain: "user",
    table: "employees",
    columns: &[
        Column { name: "name", kind: ColumnKind::Text },
        Column { name: "email", kind: ColumnKind::Text },
        Column { name: "role", kind: ColumnKind::Text },
        Column { name: "account_id", kind: ColumnKind::Text },
        Column { name: "store_id", kind: ColumnKind::Text },
        Column { name: "active", kind: ColumnKind::Boolean },
    ],
    deletion: DeletionStrategy::Soft,
    relations: &[],
};

vendhub_core::record_audit!(Employee, soft);

impl Persistable for Employee {
    fn descriptor() -> &'static EntityDescriptor {
        &EMPLOYEE
    }
}
