use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vendhub_core::EntityId;
use vendhub_store::{Column, ColumnKind, DeletionStrategy, EntityDescriptor, Persistable};

/// Replica of a platform account, the operator identity everything else
/// hangs off. Owned by the identity service; we only mirror it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Origin-service lifecycle state, carried as opaque text.
    #[serde(default)]
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

pub static ACCOUNT: EntityDescriptor = EntityDescriptor {
    domain: "account",
    table: "accounts",
    columns: &[
        Column { name: "name", kind: ColumnKind::Text },
        Column { name: "email", kind: ColumnKind::Text },
        Column { name: "phone", kind: ColumnKind::Text },
        Column { name: "status", kind: ColumnKind::Text },
    ],
    deletion: DeletionStrategy::Soft,
    relations: &[],
};

vendhub_core::record_audit!(Account, soft);

impl Persistable for Account {
    fn descriptor() -> &'static EntityDescriptor {
        &ACCOUNT
    }
}
