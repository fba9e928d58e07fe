use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vendhub_core::EntityId;
use vendhub_store::{Column, ColumnKind, DeletionStrategy, EntityDescriptor, Persistable};

/// A requested transfer of collected revenue to a bank account.
///
/// Payouts start `pending` and move to `approved` exactly once, via the
/// approval command. The status stays plain text on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    pub id: EntityId,
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub bank_account_id: Option<String>,
    #[serde(default = "Payout::initial_status")]
    pub status: String,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Payout {
    pub const PENDING: &'static str = "pending";
    pub const APPROVED: &'static str = "approved";

    fn initial_status() -> String {
        Self::PENDING.to_owned()
    }

    pub fn is_pending(&self) -> bool {
        self.status == Self::PENDING
    }
}

pub static PAYOUT: EntityDescriptor = EntityDescriptor {
    domain: "payout",
    table: "payouts",
    columns: &[
        Column { name: "amount", kind: ColumnKind::BigInt },
        Column { name: "currency", kind: ColumnKind::Text },
        Column { name: "account_id", kind: ColumnKind::Text },
        Column { name: "bank_account_id", kind: ColumnKind::Text },
        Column { name: "status", kind: ColumnKind::Text },
        Column { name: "approved_at", kind: ColumnKind::Timestamp },
        Column { name: "approved_by", kind: ColumnKind::Text },
    ],
    deletion: DeletionStrategy::Soft,
    relations: &[],
};

vendhub_core::record_audit!(Payout, soft);

impl Persistable for Payout {
    fn descriptor() -> &'static EntityDescriptor {
        &PAYOUT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_defaults_to_pending() {
        let payout: Payout = serde_json::from_value(json!({
            "id": "po-1",
            "amount": 125_00,
            "created_at": "2026-04-01T00:00:00Z",
            "updated_at": "2026-04-01T00:00:00Z",
        }))
        .unwrap();
        assert!(payout.is_pending());
        assert!(payout.approved_at.is_none());
    }
}
