//! `vendhub-events` — messaging contract for the replication pipeline.
//!
//! Everything transport-shaped lives here: the envelope and settlement
//! handles, the bus trait with its in-memory implementation, topic patterns
//! and queue topology, and the reliable-processing wrapper that turns unit
//! of work failures into dead-letter publishes.

pub mod bus;
pub mod dead_letter;
pub mod envelope;
pub mod in_memory;
pub mod reliable;
pub mod router;
pub mod topic;
pub mod topology;

pub use bus::{BusError, MessageBus, Subscription};
pub use dead_letter::DeadLetterPublisher;
pub use envelope::{DeliveryHandle, Envelope};
pub use in_memory::InMemoryBus;
pub use reliable::{HandlerConfig, Outcome, ReliableHandler};
pub use router::{EventHandler, TopicRouter};
pub use topic::TopicPattern;
pub use topology::{QueueSpec, Topology, dead_letter_key, dead_letter_queue};
