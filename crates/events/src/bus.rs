//! Message transport abstraction (mechanics only).
//!
//! The bus is intentionally **lightweight** and makes minimal assumptions:
//!
//! - **Transport-agnostic**: works with an in-memory router for tests/dev or
//!   a real broker in production.
//! - **At-least-once delivery**: a delivery stays in flight until settled via
//!   `ack`/`nack`, and unsettled deliveries reappear after a crash, so
//!   handlers must be idempotent.
//! - **No handler-level concurrency**: each queue is consumed by a single
//!   loop, one message at a time, in broker delivery order.
//! - **No persistence of consumed data**: the bus distributes messages; the
//!   relational store is the source of truth for replicas.
//!
//! `nack` drops the delivery without requeueing it. Dead-letter routing is
//! layered on top by the consumer side, not by the transport.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::envelope::{DeliveryHandle, Envelope};
use crate::topology::Topology;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("broker connection: {0}")]
    Connection(String),

    #[error("broker command: {0}")]
    Command(String),

    #[error("payload serialization: {0}")]
    Serialization(String),

    /// Redeclaring an existing queue with different bindings. Fatal at
    /// startup by contract.
    #[error("queue `{queue}` redeclared with different bindings: {detail}")]
    TopologyConflict { queue: String, detail: String },

    #[error("unknown queue `{0}`")]
    UnknownQueue(String),

    /// The handle was already settled, or never minted by this transport.
    #[error("delivery `{0}` is not in flight")]
    UnknownDelivery(String),
}

/// Stream of deliveries for a single queue.
///
/// Designed for single-loop consumption: one envelope per `recv`, and a slow
/// handler naturally throttles the feed because the next message is not
/// pulled until the current one is settled.
#[derive(Debug)]
pub struct Subscription {
    feed: Feed,
}

#[derive(Debug)]
enum Feed {
    Bounded(mpsc::Receiver<Envelope>),
    Unbounded(mpsc::UnboundedReceiver<Envelope>),
}

impl Subscription {
    pub fn bounded(receiver: mpsc::Receiver<Envelope>) -> Self {
        Self {
            feed: Feed::Bounded(receiver),
        }
    }

    pub fn unbounded(receiver: mpsc::UnboundedReceiver<Envelope>) -> Self {
        Self {
            feed: Feed::Unbounded(receiver),
        }
    }

    /// Next delivery, or `None` once the transport closes the feed.
    pub async fn recv(&mut self) -> Option<Envelope> {
        match &mut self.feed {
            Feed::Bounded(rx) => rx.recv().await,
            Feed::Unbounded(rx) => rx.recv().await,
        }
    }

    /// Non-blocking variant for tests and drain loops.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        match &mut self.feed {
            Feed::Bounded(rx) => rx.try_recv().ok(),
            Feed::Unbounded(rx) => rx.try_recv().ok(),
        }
    }
}

/// Topic-routed message transport.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Idempotently create queues and bindings.
    ///
    /// Safe to run on every boot: identical redeclaration is a no-op,
    /// conflicting redeclaration fails with [`BusError::TopologyConflict`].
    async fn declare(&self, topology: &Topology) -> Result<(), BusError>;

    /// Route `payload` to every queue whose binding matches `routing_key`.
    /// A key nothing is bound to is dropped by the broker, not an error.
    async fn publish(&self, routing_key: &str, payload: &Value) -> Result<(), BusError>;

    /// Attach the single consumer loop for `queue`.
    async fn subscribe(&self, queue: &str) -> Result<Subscription, BusError>;

    async fn ack(&self, delivery: DeliveryHandle) -> Result<(), BusError>;

    async fn nack(&self, delivery: DeliveryHandle) -> Result<(), BusError>;
}

#[async_trait]
impl<B> MessageBus for Arc<B>
where
    B: MessageBus + ?Sized,
{
    async fn declare(&self, topology: &Topology) -> Result<(), BusError> {
        (**self).declare(topology).await
    }

    async fn publish(&self, routing_key: &str, payload: &Value) -> Result<(), BusError> {
        (**self).publish(routing_key, payload).await
    }

    async fn subscribe(&self, queue: &str) -> Result<Subscription, BusError> {
        (**self).subscribe(queue).await
    }

    async fn ack(&self, delivery: DeliveryHandle) -> Result<(), BusError> {
        (**self).ack(delivery).await
    }

    async fn nack(&self, delivery: DeliveryHandle) -> Result<(), BusError> {
        (**self).nack(delivery).await
    }
}
