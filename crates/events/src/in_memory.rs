//! In-memory bus for tests/dev.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::bus::{BusError, MessageBus, Subscription};
use crate::envelope::{DeliveryHandle, Envelope};
use crate::topic::TopicPattern;
use crate::topology::Topology;

/// In-memory topic-routed bus.
///
/// Close enough to the broker contract for handler tests and the dev mode:
/// bindings route published messages into queues, deliveries stay in flight
/// until settled, and settling an unknown handle is an error. Queues are
/// unbounded, so publishing never blocks.
#[derive(Default)]
pub struct InMemoryBus {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    queues: HashMap<String, Queue>,
    /// Delivery token -> queue it belongs to.
    in_flight: HashMap<String, String>,
    next_token: u64,
    acked: u64,
    nacked: u64,
}

struct Queue {
    bindings: Vec<TopicPattern>,
    sender: mpsc::UnboundedSender<Envelope>,
    receiver: Option<mpsc::UnboundedReceiver<Envelope>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliveries published but not yet settled (queued ones included).
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    pub fn acked(&self) -> u64 {
        self.lock().acked
    }

    pub fn nacked(&self) -> u64 {
        self.lock().nacked
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock means a test already panicked; propagating the
        // panic here just obscures the original failure.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait::async_trait]
impl MessageBus for InMemoryBus {
    async fn declare(&self, topology: &Topology) -> Result<(), BusError> {
        let mut state = self.lock();
        for spec in topology.queues() {
            if let Some(existing) = state.queues.get(spec.name()) {
                let mut have: Vec<&str> = existing.bindings.iter().map(TopicPattern::as_str).collect();
                let mut want: Vec<&str> = spec.bindings().iter().map(TopicPattern::as_str).collect();
                have.sort_unstable();
                want.sort_unstable();
                if have != want {
                    return Err(BusError::TopologyConflict {
                        queue: spec.name().to_owned(),
                        detail: format!("have {have:?}, requested {want:?}"),
                    });
                }
                continue;
            }
            let (sender, receiver) = mpsc::unbounded_channel();
            state.queues.insert(
                spec.name().to_owned(),
                Queue {
                    bindings: spec.bindings().to_vec(),
                    sender,
                    receiver: Some(receiver),
                },
            );
        }
        Ok(())
    }

    async fn publish(&self, routing_key: &str, payload: &Value) -> Result<(), BusError> {
        let mut state = self.lock();
        let matched: Vec<(String, mpsc::UnboundedSender<Envelope>)> = state
            .queues
            .iter()
            .filter(|(_, queue)| queue.bindings.iter().any(|p| p.matches(routing_key)))
            .map(|(name, queue)| (name.clone(), queue.sender.clone()))
            .collect();
        if matched.is_empty() {
            debug!(routing_key, "no binding matched, message dropped");
            return Ok(());
        }
        for (queue, sender) in matched {
            state.next_token += 1;
            let token = state.next_token.to_string();
            let envelope = Envelope::new(routing_key, payload.clone(), DeliveryHandle::new(&token));
            if sender.send(envelope).is_ok() {
                state.in_flight.insert(token, queue);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, queue: &str) -> Result<Subscription, BusError> {
        let mut state = self.lock();
        let entry = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BusError::UnknownQueue(queue.to_owned()))?;
        let receiver = entry
            .receiver
            .take()
            .ok_or_else(|| BusError::Command(format!("queue `{queue}` already has a consumer")))?;
        Ok(Subscription::unbounded(receiver))
    }

    async fn ack(&self, delivery: DeliveryHandle) -> Result<(), BusError> {
        let mut state = self.lock();
        state
            .in_flight
            .remove(delivery.token())
            .ok_or_else(|| BusError::UnknownDelivery(delivery.token().to_owned()))?;
        state.acked += 1;
        Ok(())
    }

    async fn nack(&self, delivery: DeliveryHandle) -> Result<(), BusError> {
        let mut state = self.lock();
        state
            .in_flight
            .remove(delivery.token())
            .ok_or_else(|| BusError::UnknownDelivery(delivery.token().to_owned()))?;
        state.nacked += 1;
        Ok(())
    }
}
