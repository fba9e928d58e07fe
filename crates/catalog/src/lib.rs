//! `vendhub-catalog` — replicas of the merchandising entities.

pub mod category;
pub mod operation;
pub mod price;
pub mod product;
pub mod product_type;

pub use category::Category;
pub use operation::Operation;
pub use price::Price;
pub use product::Product;
pub use product_type::ProductType;

use vendhub_store::EntityDescriptor;

/// Descriptors of every entity this crate replicates.
pub fn descriptors() -> [&'static EntityDescriptor; 5] {
    [
        &category::CATEGORY,
        &product_type::PRODUCT_TYPE,
        &price::PRICE,
        &operation::OPERATION,
        &product::PRODUCT,
    ]
}
