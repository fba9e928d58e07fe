//! Dead-letter publishing.

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

use crate::bus::{BusError, MessageBus};
use crate::topology::dead_letter_key;

/// Publishes failed messages to their per-topic dead-letter route.
///
/// The parked body wraps the original payload with the source topic, the
/// rendered error and the failure time, so a message can be diagnosed and
/// replayed from the queue alone.
pub struct DeadLetterPublisher<B> {
    bus: B,
}

impl<B: MessageBus> DeadLetterPublisher<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Park `payload` under the conventional `dlq.<topic>` route.
    pub async fn publish(&self, topic: &str, payload: &Value, error: &str) -> Result<(), BusError> {
        self.publish_to(&dead_letter_key(topic), topic, payload, error).await
    }

    /// Park under an explicit route, for handlers configured with one.
    pub async fn publish_to(
        &self,
        routing_key: &str,
        topic: &str,
        payload: &Value,
        error: &str,
    ) -> Result<(), BusError> {
        let body = json!({
            "topic": topic,
            "payload": payload,
            "error": error,
            "failed_at": Utc::now(),
        });
        warn!(topic, routing_key, error, "dead-lettering message");
        self.bus.publish(routing_key, &body).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::bus::MessageBus;
    use crate::in_memory::InMemoryBus;
    use crate::topology::Topology;

    #[tokio::test]
    async fn parked_body_carries_topic_payload_and_error() {
        let bus = Arc::new(InMemoryBus::new());
        bus.declare(&Topology::replication("events", &["account"]))
            .await
            .unwrap();
        let mut dlq = bus.subscribe("dlq.account").await.unwrap();

        let publisher = DeadLetterPublisher::new(bus.clone());
        publisher
            .publish("account.created", &json!({"id": "a-1"}), "name: required (missing)")
            .await
            .unwrap();

        let envelope = dlq.recv().await.unwrap();
        assert_eq!(envelope.topic(), "dlq.account.created");
        let body = envelope.payload();
        assert_eq!(body["topic"], "account.created");
        assert_eq!(body["payload"]["id"], "a-1");
        assert_eq!(body["error"], "name: required (missing)");
        assert!(body["failed_at"].is_string());
    }
}
