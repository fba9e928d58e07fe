//! `vendhub-store` — descriptor-driven persistence abstraction.
//!
//! One generic [`Repository`] serves every replicated entity: entities
//! declare a static [`EntityDescriptor`] (table, typed columns, deletion
//! strategy, relations) and the repository derives all CRUD, soft-delete,
//! pagination, search and bulk-upsert behavior from it. The in-memory
//! implementation here backs tests and the dev mode; the SQL one lives in
//! `vendhub-infra`.

pub mod descriptor;
pub mod error;
pub mod memory;
pub mod query;
pub mod repository;

pub use descriptor::{Column, ColumnKind, DeletionStrategy, EntityDescriptor, Persistable, Relation};
pub use error::StoreError;
pub use memory::InMemoryRepository;
pub use query::{Direction, Filter, FilterValue, ListQuery, Listing, PageMeta, Sort};
pub use repository::{Patch, Repository};
