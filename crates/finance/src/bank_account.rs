use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vendhub_core::EntityId;
use vendhub_store::{Column, ColumnKind, DeletionStrategy, EntityDescriptor, Persistable};

/// Bank account a payout settles into. Unlike most replicas these are also
/// written locally through the command channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: EntityId,
    pub holder_name: String,
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default)]
    pub bic: Option<String>,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub verified: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

pub static BANK_ACCOUNT: EntityDescriptor = EntityDescriptor {
    domain: "bank_account",
    table: "bank_accounts",
    columns: &[
        Column { name: "holder_name", kind: ColumnKind::Text },
        Column { name: "iban", kind: ColumnKind::Text },
        Column { name: "bic", kind: ColumnKind::Text },
        Column { name: "bank_name", kind: ColumnKind::Text },
        Column { name: "currency", kind: ColumnKind::Text },
        Column { name: "account_id", kind: ColumnKind::Text },
        Column { name: "verified", kind: ColumnKind::Boolean },
    ],
    deletion: DeletionStrategy::Soft,
    relations: &[],
};

vendhub_core::record_audit!(BankAccount, soft);

impl Persistable for BankAccount {
    fn descriptor() -> &'static EntityDescriptor {
        &BANK_ACCOUNT
    }
}
