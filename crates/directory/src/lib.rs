//! `vendhub-directory` — replicas of the org-structure entities.
//!
//! Accounts, companies, stores, customers and employees are owned by other
//! services; this crate holds their local record shapes and descriptors.

pub mod account;
pub mod company;
pub mod customer;
pub mod employee;
pub mod store;

pub use account::Account;
pub use company::Company;
pub use customer::Customer;
pub use employee::Employee;
pub use store::Store;

use vendhub_store::EntityDescriptor;

/// Descriptors of every entity this crate replicates.
pub fn descriptors() -> [&'static EntityDescriptor; 5] {
    [
        &account::ACCOUNT,
        &company::COMPANY,
        &store::STORE,
        &customer::CUSTOMER,
        &employee::EMPLOYEE,
    ]
}
