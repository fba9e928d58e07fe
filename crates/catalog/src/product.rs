use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vendhub_core::EntityId;
use vendhub_store::{
    Column, ColumnKind, DeletionStrategy, EntityDescriptor, Persistable, Relation,
};

use crate::price::{PRICE, Price};

/// Replica of a sellable product. Reads come back with the product's prices
/// attached, which is what slot-planning callers want in one round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub type_id: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    /// Eager-loaded children; never part of the products table itself.
    #[serde(default)]
    pub prices: Vec<Price>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

pub static PRODUCT: EntityDescriptor = EntityDescriptor {
    domain: "product",
    table: "products",
    columns: &[
        Column { name: "name", kind: ColumnKind::Text },
        Column { name: "description", kind: ColumnKind::Text },
        Column { name: "barcode", kind: ColumnKind::Text },
        Column { name: "type_id", kind: ColumnKind::Text },
        Column { name: "category_id", kind: ColumnKind::Text },
        Column { name: "active", kind: ColumnKind::Boolean },
    ],
    deletion: DeletionStrategy::Soft,
    relations: &[Relation {
        field: "prices",
        foreign_key: "product_id",
        target: &PRICE,
    }],
};

vendhub_core::record_audit!(Product, soft);

impl Persistable for Product {
    fn descriptor() -> &'static EntityDescriptor {
        &PRODUCT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn barcode_is_a_searchable_text_column_but_type_id_is_not() {
        let searchable: Vec<&str> = PRODUCT.searchable_columns().collect();
        assert!(searchable.contains(&"barcode"));
        assert!(searchable.contains(&"name"));
        assert!(!searchable.contains(&"type_id"));
        assert!(!searchable.contains(&"category_id"));
    }

    #[test]
    fn payload_without_prices_still_deserializes() {
        let product: Product = serde_json::from_value(json!({
            "id": "p-5",
            "name": "Sparkling Water 0.5l",
            "active": true,
            "created_at": "2026-03-10T10:00:00Z",
            "updated_at": "2026-03-10T10:00:00Z",
        }))
        .unwrap();
        assert!(product.prices.is_empty());
        assert_eq!(product.active, Some(true));
    }
}
