//! Long-running consumer loops.
//!
//! One task per queue, one delivery in flight at a time. The event consumer
//! routes by topic and settles through [`ReliableHandler`], so every
//! delivery ends acked, parked-then-acked, or nacked. The command consumer
//! is synchronous request/response: it always acks and failures travel back
//! to the caller inside the reply envelope instead of a dead-letter queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use vendhub_core::DomainError;
use vendhub_events::{
    BusError, HandlerConfig, MessageBus, Outcome, ReliableHandler, TopicRouter,
};
use vendhub_service::{CommandRegistry, CommandRequest};

/// Settlement counters, readable while the loop runs.
#[derive(Debug, Default)]
pub struct ConsumerStats {
    processed: AtomicU64,
    completed: AtomicU64,
    dead_lettered: AtomicU64,
    rejected: AtomicU64,
}

impl ConsumerStats {
    /// Deliveries that reached a terminal action.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn dead_lettered(&self) -> u64 {
        self.dead_lettered.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// A running consumer loop.
pub struct ConsumerHandle {
    task: JoinHandle<()>,
    stats: Arc<ConsumerStats>,
}

impl ConsumerHandle {
    pub fn stats(&self) -> Arc<ConsumerStats> {
        Arc::clone(&self.stats)
    }

    /// Wait for the loop to finish draining after a shutdown signal.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            debug!(error = %e, "consumer task did not exit cleanly");
        }
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Spawn the event-consumption loop for `config.queue`.
///
/// Deliveries are resolved against `router`; a topic no route matches is a
/// failure like any other and follows the dead-letter path, so a binding
/// typo parks messages instead of silently dropping them. The loop stops
/// between messages once `shutdown` flips.
pub async fn spawn_consumer<B>(
    bus: B,
    router: Arc<TopicRouter>,
    config: HandlerConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Result<ConsumerHandle, BusError>
where
    B: MessageBus + Clone + 'static,
{
    let mut subscription = bus.subscribe(&config.queue).await?;
    let queue = config.queue.clone();
    let handler = ReliableHandler::new(bus, config);
    let stats = Arc::new(ConsumerStats::default());
    let loop_stats = Arc::clone(&stats);

    info!(queue = %queue, "event consumer started");
    let task = tokio::spawn(async move {
        loop {
            let envelope = tokio::select! {
                _ = shutdown.changed() => break,
                envelope = subscription.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break, // transport closed the feed
                },
            };

            let topic = envelope.topic().to_owned();
            let router = Arc::clone(&router);
            let outcome = handler
                .process(envelope, |topic, payload| async move {
                    match router.resolve(&topic) {
                        Some(handler) => handler.handle(&topic, payload).await,
                        None => Err(DomainError::unknown(format!("no handler for topic `{topic}`"))),
                    }
                })
                .await;
            match outcome {
                Ok(Outcome::Completed) => {
                    loop_stats.completed.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Outcome::DeadLettered) => {
                    warn!(queue = %queue, topic = %topic, "delivery parked on dead-letter route");
                    loop_stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Outcome::Rejected) => {
                    warn!(queue = %queue, topic = %topic, "delivery rejected");
                    loop_stats.rejected.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    // Settlement failed; the broker still holds the message
                    // and will redeliver it.
                    error!(queue = %queue, topic = %topic, error = %e, "settlement failed");
                }
            }
            loop_stats.processed.fetch_add(1, Ordering::Relaxed);
        }
        info!(queue = %queue, "event consumer stopped");
    });

    Ok(ConsumerHandle { task, stats })
}

/// Spawn the command-channel loop for `queue`.
///
/// Every delivery is parsed, dispatched and acked; when the request names a
/// `reply_to` queue, the response envelope is published there. A request
/// that cannot even be parsed is answered (when possible) and acked too;
/// redelivering it could never succeed.
pub async fn spawn_command_consumer<B>(
    bus: B,
    queue: &str,
    registry: Arc<CommandRegistry>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<ConsumerHandle, BusError>
where
    B: MessageBus + Clone + 'static,
{
    let mut subscription = bus.subscribe(queue).await?;
    let queue = queue.to_owned();
    let stats = Arc::new(ConsumerStats::default());
    let loop_stats = Arc::clone(&stats);

    info!(queue = %queue, "command consumer started");
    let task = tokio::spawn(async move {
        loop {
            let envelope = tokio::select! {
                _ = shutdown.changed() => break,
                envelope = subscription.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break,
                },
            };
            let (_, payload, delivery) = envelope.into_parts();

            // Pulled out before parsing so even a malformed request can be
            // answered instead of leaving the caller waiting.
            let reply_to = payload
                .get("reply_to")
                .and_then(Value::as_str)
                .map(str::to_owned);
            let response = match CommandRequest::parse(payload) {
                Ok(request) => registry.dispatch(request).await,
                Err(err) => {
                    warn!(queue = %queue, error = %err, "unparseable command");
                    err.into()
                }
            };
            if response.success {
                loop_stats.completed.fetch_add(1, Ordering::Relaxed);
            } else {
                loop_stats.rejected.fetch_add(1, Ordering::Relaxed);
            }

            if let Some(reply_queue) = reply_to {
                match serde_json::to_value(&response) {
                    Ok(body) => {
                        if let Err(e) = bus.publish(&reply_queue, &body).await {
                            error!(queue = %queue, reply_queue = %reply_queue, error = %e, "reply publish failed");
                        }
                    }
                    Err(e) => {
                        error!(queue = %queue, error = %e, "reply serialization failed");
                    }
                }
            }
            if let Err(e) = bus.ack(delivery).await {
                error!(queue = %queue, error = %e, "command ack failed");
            }
            loop_stats.processed.fetch_add(1, Ordering::Relaxed);
        }
        info!(queue = %queue, "command consumer stopped");
    });

    Ok(ConsumerHandle { task, stats })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::time::{sleep, timeout};

    use super::*;
    use vendhub_core::Response;
    use vendhub_events::{EventHandler, InMemoryBus, QueueSpec, Topology};
    use vendhub_service::CommandHandler;

    struct FailOn(&'static str);

    #[async_trait]
    impl EventHandler for FailOn {
        async fn handle(&self, topic: &str, _payload: Value) -> Result<Response, DomainError> {
            if topic == self.0 {
                Err(DomainError::unknown("store offline"))
            } else {
                Ok(Response::ok("done"))
            }
        }
    }

    struct Pong;

    #[async_trait]
    impl CommandHandler for Pong {
        async fn execute(&self, _payload: Value) -> Response {
            Response::ok("pong")
        }
    }

    async fn wait_for(stats: &ConsumerStats, processed: u64) {
        timeout(Duration::from_secs(2), async {
            while stats.processed() < processed {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn consumer_settles_successes_and_parks_failures() {
        let bus = Arc::new(InMemoryBus::new());
        bus.declare(&Topology::replication("events", &["account"])).await.unwrap();
        let router = Arc::new(
            TopicRouter::new().route("account.*", Arc::new(FailOn("account.updated"))),
        );
        let (stop, watch_rx) = watch::channel(false);
        let handle = spawn_consumer(bus.clone(), router, HandlerConfig::new("events"), watch_rx)
            .await
            .unwrap();

        bus.publish("account.created", &json!({"id": "a-1"})).await.unwrap();
        bus.publish("account.updated", &json!({"id": "a-1"})).await.unwrap();

        let stats = handle.stats();
        wait_for(&stats, 2).await;
        assert_eq!(stats.completed(), 1);
        assert_eq!(stats.dead_lettered(), 1);
        assert_eq!(stats.rejected(), 0);

        let mut dlq = bus.subscribe("dlq.account").await.unwrap();
        let parked = dlq.recv().await.unwrap();
        assert_eq!(parked.topic(), "dlq.account.updated");
        assert_eq!(parked.payload()["error"], "store offline");

        stop.send(true).unwrap();
        handle.join().await;
    }

    #[tokio::test]
    async fn unrouted_topics_park_instead_of_vanishing() {
        let bus = Arc::new(InMemoryBus::new());
        bus.declare(&Topology::replication("events", &["account"])).await.unwrap();
        let (_stop, watch_rx) = watch::channel(false);
        let handle = spawn_consumer(
            bus.clone(),
            Arc::new(TopicRouter::new()),
            HandlerConfig::new("events"),
            watch_rx,
        )
        .await
        .unwrap();

        bus.publish("account.created", &json!({"id": "a-9"})).await.unwrap();

        let stats = handle.stats();
        wait_for(&stats, 1).await;
        assert_eq!(stats.dead_lettered(), 1);

        let mut dlq = bus.subscribe("dlq.account").await.unwrap();
        let parked = dlq.recv().await.unwrap();
        let reason = parked.payload()["error"].as_str().unwrap();
        assert!(reason.contains("no handler for topic"));
    }

    #[tokio::test]
    async fn command_consumer_replies_and_always_acks() {
        let bus = Arc::new(InMemoryBus::new());
        let topology = Topology::new()
            .queue(QueueSpec::point_to_point("commands"))
            .queue(QueueSpec::point_to_point("replies"));
        bus.declare(&topology).await.unwrap();
        let mut registry = CommandRegistry::new();
        registry.register("health.ping", Arc::new(Pong));
        let (_stop, watch_rx) = watch::channel(false);
        let handle = spawn_command_consumer(bus.clone(), "commands", Arc::new(registry), watch_rx)
            .await
            .unwrap();

        bus.publish(
            "commands",
            &json!({"cmd": "health.ping", "payload": {}, "reply_to": "replies"}),
        )
        .await
        .unwrap();
        bus.publish("commands", &json!({"payload": {}})).await.unwrap();

        let stats = handle.stats();
        wait_for(&stats, 2).await;
        assert_eq!(stats.completed(), 1);
        assert_eq!(stats.rejected(), 1);

        let mut replies = bus.subscribe("replies").await.unwrap();
        let reply = replies.recv().await.unwrap();
        assert_eq!(reply.payload()["success"], true);
        assert_eq!(reply.payload()["message"], "pong");

        // Both command deliveries acked, the reply is the only one in flight.
        assert_eq!(bus.acked(), 2);
        assert_eq!(bus.in_flight(), 1);
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop_between_messages() {
        let bus = Arc::new(InMemoryBus::new());
        bus.declare(&Topology::replication("events", &["account"])).await.unwrap();
        let (stop, watch_rx) = watch::channel(false);
        let handle = spawn_consumer(
            bus.clone(),
            Arc::new(TopicRouter::new().route("#", Arc::new(FailOn("none")))),
            HandlerConfig::new("events"),
            watch_rx,
        )
        .await
        .unwrap();

        bus.publish("account.created", &json!({})).await.unwrap();
        let stats = handle.stats();
        wait_for(&stats, 1).await;

        stop.send(true).unwrap();
        handle.join().await;
        assert_eq!(stats.completed(), 1);
    }
}
