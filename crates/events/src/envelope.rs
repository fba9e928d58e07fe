use serde_json::Value;

/// Broker-assigned token identifying one delivery of one message.
///
/// Handlers treat the token as opaque: only the transport that minted it may
/// interpret it, and the only valid use is to hand it back to `ack` or `nack`
/// exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryHandle(String);

impl DeliveryHandle {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token, for the minting transport only.
    pub fn token(&self) -> &str {
        &self.0
    }
}

/// The unit delivered by the broker: routing topic, raw JSON payload and the
/// handle needed to settle the delivery.
#[derive(Debug, Clone)]
pub struct Envelope {
    topic: String,
    payload: Value,
    delivery: DeliveryHandle,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, payload: Value, delivery: DeliveryHandle) -> Self {
        Self {
            topic: topic.into(),
            payload,
            delivery,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn delivery(&self) -> &DeliveryHandle {
        &self.delivery
    }

    pub fn into_parts(self) -> (String, Value, DeliveryHandle) {
        (self.topic, self.payload, self.delivery)
    }
}
