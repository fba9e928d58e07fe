//! Acknowledgment discipline around one unit of work.

use std::future::Future;

use serde_json::Value;
use tracing::error;

use vendhub_core::{DomainError, Response};

use crate::bus::{BusError, MessageBus};
use crate::dead_letter::DeadLetterPublisher;
use crate::envelope::Envelope;
use crate::topology::dead_letter_key;

/// Per-queue consumption policy.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub queue: String,
    pub use_dead_letter: bool,
    /// Overrides the derived `dlq.<topic>` route when set.
    pub dead_letter_key: Option<String>,
}

impl HandlerConfig {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            use_dead_letter: true,
            dead_letter_key: None,
        }
    }

    pub fn without_dead_letter(mut self) -> Self {
        self.use_dead_letter = false;
        self
    }

    pub fn with_dead_letter_key(mut self, key: impl Into<String>) -> Self {
        self.dead_letter_key = Some(key.into());
        self
    }
}

/// Terminal action taken for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Work succeeded; the delivery was acked.
    Completed,
    /// Work failed; the message was parked and the delivery acked.
    DeadLettered,
    /// Work failed with no dead-letter path; the delivery was nacked.
    Rejected,
}

/// Wraps a unit of work with the settlement contract.
///
/// Every delivery ends in exactly one terminal action. Success acks. Failure
/// parks the original payload on the dead-letter route and acks only once
/// parking succeeded, which keeps a poison message from looping locally;
/// when parking itself fails, or the queue opted out of dead-lettering, the
/// delivery is nacked instead.
pub struct ReliableHandler<B: MessageBus + Clone> {
    bus: B,
    dead_letters: DeadLetterPublisher<B>,
    config: HandlerConfig,
}

impl<B: MessageBus + Clone> ReliableHandler<B> {
    pub fn new(bus: B, config: HandlerConfig) -> Self {
        Self {
            dead_letters: DeadLetterPublisher::new(bus.clone()),
            bus,
            config,
        }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Run `work` for one delivery and settle it.
    ///
    /// A success envelope acks; an error or a failure envelope follows the
    /// dead-letter path. Bus failures during settlement are returned to the
    /// caller, which cannot do anything but log them: the broker will
    /// redeliver the unsettled message.
    pub async fn process<F, Fut>(&self, envelope: Envelope, work: F) -> Result<Outcome, BusError>
    where
        F: FnOnce(String, Value) -> Fut,
        Fut: Future<Output = Result<Response, DomainError>>,
    {
        let (topic, payload, delivery) = envelope.into_parts();
        let reason = match work(topic.clone(), payload.clone()).await {
            Ok(resp) if resp.success => {
                self.bus.ack(delivery).await?;
                return Ok(Outcome::Completed);
            }
            Ok(resp) => match resp.errors {
                Some(errors) if !errors.is_empty() => {
                    format!("{} [{}]", resp.message, errors.join("; "))
                }
                _ => resp.message,
            },
            Err(err) => err.to_string(),
        };

        if !self.config.use_dead_letter {
            self.bus.nack(delivery).await?;
            return Ok(Outcome::Rejected);
        }

        let key = match &self.config.dead_letter_key {
            Some(key) => key.clone(),
            None => dead_letter_key(&topic),
        };
        match self.dead_letters.publish_to(&key, &topic, &payload, &reason).await {
            Ok(()) => {
                self.bus.ack(delivery).await?;
                Ok(Outcome::DeadLettered)
            }
            Err(publish_err) => {
                error!(
                    queue = %self.config.queue,
                    topic,
                    error = %publish_err,
                    "dead-letter publish failed, rejecting delivery"
                );
                self.bus.nack(delivery).await?;
                Ok(Outcome::Rejected)
            }
        }
    }
}
