//! Application services over the store and event layers.
//!
//! [`EntityService`] turns raw JSON payloads into repository calls and
//! uniform [`vendhub_core::Response`] envelopes. [`ReplicaHandler`] adapts a
//! service to the event channel, the command module to the synchronous one.

pub mod command;
pub mod payouts;
pub mod replica;
pub mod service;
pub mod shape;

pub use command::{
    CommandHandler, CommandRegistry, CommandRequest, register_queries, register_writes,
};
pub use payouts::ApprovePayout;
pub use replica::ReplicaHandler;
pub use service::{EntityService, ReplicaValidation};
pub use shape::{PayloadShape, Passthrough, RequiredFields};
