//! Redis Streams-backed message bus (durable, at-least-once delivery).
//!
//! ## Layout
//!
//! - **Queue stream**: `vendhub:queue:<name>`, one stream per queue. Entries
//!   carry two fields, `topic` and `payload`.
//! - **Consumer group**: one per queue, named after the queue, created with
//!   `XGROUP CREATE ... 0 MKSTREAM` at declare time.
//! - **Binding registry**: hash `vendhub:topology` mapping each queue to its
//!   binding patterns as a JSON array. Redeclaration compares against the
//!   stored value first, so two processes disagreeing about a queue's
//!   bindings fail loudly instead of splitting traffic.
//!
//! Delivery tokens are `<queue>/<entry-id>`. `ack` XACKs the entry; `nack`
//! XACKs it too, because a rejected delivery is dropped and parking failed
//! messages is the consumer's job, not the transport's. Entries that are
//! never settled stay in the group's pending list and are claimed back once
//! their idle time passes the claim threshold, which is what makes delivery
//! at-least-once across crashes.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use serde_json::Value;
use tracing::{debug, error, instrument, warn};

use vendhub_events::{
    BusError, DeliveryHandle, Envelope, MessageBus, Subscription, TopicPattern, Topology,
};

/// Key prefix shared by all bus structures.
const DEFAULT_NAMESPACE: &str = "vendhub";

/// Idle time after which an unacknowledged delivery is claimed back.
const DEFAULT_CLAIM_IDLE_MS: u64 = 30_000;

/// XREADGROUP blocking timeout per poll.
const DEFAULT_BLOCK_MS: u64 = 5_000;

/// How many pending entries one redelivery sweep inspects.
const CLAIM_BATCH: usize = 10;

#[derive(Clone)]
pub struct RedisStreamsBus {
    client: Arc<redis::Client>,
    conn: MultiplexedConnection,
    namespace: String,
    consumer: String,
    routes: Arc<RwLock<BTreeMap<String, Vec<TopicPattern>>>>,
    claim_idle_ms: u64,
    block_ms: u64,
}

impl RedisStreamsBus {
    /// Connect to Redis and open the control-plane connection.
    ///
    /// `consumer_name` identifies this process within every consumer group;
    /// it should be unique per process so stale pending entries of a dead
    /// consumer can be told apart and claimed.
    pub async fn connect(
        redis_url: impl AsRef<str>,
        consumer_name: impl Into<String>,
    ) -> Result<Self, BusError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| BusError::Connection(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            conn,
            namespace: DEFAULT_NAMESPACE.to_owned(),
            consumer: consumer_name.into(),
            routes: Arc::new(RwLock::new(BTreeMap::new())),
            claim_idle_ms: DEFAULT_CLAIM_IDLE_MS,
            block_ms: DEFAULT_BLOCK_MS,
        })
    }

    fn stream_key(&self, queue: &str) -> String {
        format!("{}:queue:{}", self.namespace, queue)
    }

    fn bindings_key(&self) -> String {
        format!("{}:topology", self.namespace)
    }

    async fn settle(&self, delivery: DeliveryHandle) -> Result<(), BusError> {
        let token = delivery.token();
        let Some((queue, entry_id)) = token.split_once('/') else {
            return Err(BusError::UnknownDelivery(token.to_owned()));
        };

        let mut conn = self.conn.clone();
        let acked: u64 = redis::cmd("XACK")
            .arg(self.stream_key(queue))
            .arg(queue)
            .arg(entry_id)
            .query_async(&mut conn)
            .await
            .map_err(|e| BusError::Command(format!("XACK failed: {e}")))?;
        // Zero means another consumer claimed and settled the same entry
        // first. Settling twice is harmless under at-least-once.
        if acked == 0 {
            debug!(token = %token, "delivery was no longer pending");
        }
        Ok(())
    }
}

#[async_trait]
impl MessageBus for RedisStreamsBus {
    #[instrument(skip_all, fields(queues = topology.queues().len()), err)]
    async fn declare(&self, topology: &Topology) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        for spec in topology.queues() {
            let declared: Vec<&str> = spec.bindings().iter().map(TopicPattern::as_str).collect();
            let encoded = serde_json::to_string(&declared)
                .map_err(|e| BusError::Serialization(e.to_string()))?;

            let existing: Option<String> = redis::cmd("HGET")
                .arg(self.bindings_key())
                .arg(spec.name())
                .query_async(&mut conn)
                .await
                .map_err(|e| BusError::Command(format!("HGET failed: {e}")))?;
            match existing {
                Some(existing) if existing != encoded => {
                    return Err(BusError::TopologyConflict {
                        queue: spec.name().to_owned(),
                        detail: format!("declared {encoded}, broker has {existing}"),
                    });
                }
                Some(_) => {}
                None => {
                    let _: u64 = redis::cmd("HSET")
                        .arg(self.bindings_key())
                        .arg(spec.name())
                        .arg(&encoded)
                        .query_async(&mut conn)
                        .await
                        .map_err(|e| BusError::Command(format!("HSET failed: {e}")))?;
                }
            }

            // MKSTREAM creates the stream with the group; an existing group
            // answers BUSYGROUP, which is the idempotent path.
            let created: Result<String, _> = redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(self.stream_key(spec.name()))
                .arg(spec.name())
                .arg("0")
                .arg("MKSTREAM")
                .query_async(&mut conn)
                .await;
            if let Err(e) = created {
                if !e.to_string().contains("BUSYGROUP") {
                    return Err(BusError::Command(format!("XGROUP CREATE failed: {e}")));
                }
            }

            self.routes
                .write()
                .unwrap()
                .insert(spec.name().to_owned(), spec.bindings().to_vec());
        }
        Ok(())
    }

    #[instrument(skip(self, payload), fields(topic = routing_key), err)]
    async fn publish(&self, routing_key: &str, payload: &Value) -> Result<(), BusError> {
        let targets: Vec<String> = {
            let routes = self.routes.read().unwrap();
            routes
                .iter()
                .filter(|(_, bindings)| bindings.iter().any(|p| p.matches(routing_key)))
                .map(|(queue, _)| queue.clone())
                .collect()
        };
        if targets.is_empty() {
            debug!(topic = routing_key, "no queue bound, dropping");
            return Ok(());
        }

        let encoded =
            serde_json::to_string(payload).map_err(|e| BusError::Serialization(e.to_string()))?;
        let mut conn = self.conn.clone();
        for queue in targets {
            let _: String = redis::cmd("XADD")
                .arg(self.stream_key(&queue))
                .arg("*")
                .arg("topic")
                .arg(routing_key)
                .arg("payload")
                .arg(&encoded)
                .query_async(&mut conn)
                .await
                .map_err(|e| BusError::Command(format!("XADD failed: {e}")))?;
        }
        Ok(())
    }

    async fn subscribe(&self, queue: &str) -> Result<Subscription, BusError> {
        if !self.routes.read().unwrap().contains_key(queue) {
            return Err(BusError::UnknownQueue(queue.to_owned()));
        }

        // Capacity 1 plus COUNT 1 reads keep exactly one delivery in flight,
        // so a slow handler throttles the poll loop instead of buffering.
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let client = Arc::clone(&self.client);
        let stream = self.stream_key(queue);
        let group = queue.to_owned();
        let consumer = self.consumer.clone();
        let claim_idle_ms = self.claim_idle_ms;
        let block_ms = self.block_ms;

        tokio::spawn(async move {
            let mut conn = match client.get_multiplexed_async_connection().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!(queue = %group, error = %e, "subscriber connection failed");
                    return;
                }
            };
            loop {
                let entries = match next_entries(
                    &mut conn,
                    &stream,
                    &group,
                    &consumer,
                    claim_idle_ms,
                    block_ms,
                )
                .await
                {
                    Ok(entries) => entries,
                    Err(e) => {
                        error!(queue = %group, error = %e, "stream read failed");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };
                for (entry_id, topic, payload) in entries {
                    let handle = DeliveryHandle::new(format!("{group}/{entry_id}"));
                    if tx.send(Envelope::new(topic, payload, handle)).await.is_err() {
                        return; // subscriber dropped
                    }
                }
            }
        });

        Ok(Subscription::bounded(rx))
    }

    async fn ack(&self, delivery: DeliveryHandle) -> Result<(), BusError> {
        self.settle(delivery).await
    }

    async fn nack(&self, delivery: DeliveryHandle) -> Result<(), BusError> {
        // Dropping, not requeueing: the entry leaves the pending list and the
        // message is gone from this queue.
        self.settle(delivery).await
    }
}

/// One poll: stale pending entries first, new entries otherwise.
async fn next_entries(
    conn: &mut MultiplexedConnection,
    stream: &str,
    group: &str,
    consumer: &str,
    claim_idle_ms: u64,
    block_ms: u64,
) -> Result<Vec<(String, String, Value)>, BusError> {
    let claimed = claim_stale(conn, stream, group, consumer, claim_idle_ms).await;
    if !claimed.is_empty() {
        return Ok(claimed);
    }
    read_new(conn, stream, group, consumer, block_ms).await
}

/// Claim entries whose consumer went quiet. `XCLAIM` with a min-idle time
/// only hands over entries stale past the threshold, so live consumers keep
/// their in-flight work.
async fn claim_stale(
    conn: &mut MultiplexedConnection,
    stream: &str,
    group: &str,
    consumer: &str,
    claim_idle_ms: u64,
) -> Vec<(String, String, Value)> {
    // XPENDING summary rows: (entry_id, consumer, idle_ms, delivery_count).
    let pending: Vec<(String, String, u64, u64)> = match redis::cmd("XPENDING")
        .arg(stream)
        .arg(group)
        .arg("-")
        .arg("+")
        .arg(CLAIM_BATCH)
        .query_async(conn)
        .await
    {
        Ok(rows) => rows,
        Err(_) => return vec![], // NOGROUP and friends; nothing to claim
    };
    let ids: Vec<String> = pending.into_iter().map(|(id, ..)| id).collect();
    if ids.is_empty() {
        return vec![];
    }

    let claimed: Vec<redis::Value> = match redis::cmd("XCLAIM")
        .arg(stream)
        .arg(group)
        .arg(consumer)
        .arg(claim_idle_ms.to_string())
        .arg(&ids[..])
        .query_async(conn)
        .await
    {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "XCLAIM failed, skipping redelivery sweep");
            return vec![];
        }
    };

    let mut entries = Vec::new();
    for entry in claimed {
        if let Some(parsed) = parse_entry(entry) {
            entries.push(parsed);
        }
    }
    entries
}

async fn read_new(
    conn: &mut MultiplexedConnection,
    stream: &str,
    group: &str,
    consumer: &str,
    block_ms: u64,
) -> Result<Vec<(String, String, Value)>, BusError> {
    // Nil reply means the blocking timeout elapsed with nothing new.
    let reply: Option<redis::Value> = redis::cmd("XREADGROUP")
        .arg("GROUP")
        .arg(group)
        .arg(consumer)
        .arg("COUNT")
        .arg(1)
        .arg("BLOCK")
        .arg(block_ms.to_string())
        .arg("STREAMS")
        .arg(stream)
        .arg(">")
        .query_async(conn)
        .await
        .map_err(|e| BusError::Command(format!("XREADGROUP failed: {e}")))?;
    let Some(reply) = reply else {
        return Ok(vec![]);
    };
    Ok(parse_reply(reply))
}

/// Reply format: [[stream_key, [entry, entry, ...]], ...].
fn parse_reply(reply: redis::Value) -> Vec<(String, String, Value)> {
    let redis::Value::Bulk(streams) = reply else {
        return vec![];
    };
    let mut out = Vec::new();
    for stream in streams {
        let redis::Value::Bulk(parts) = stream else {
            continue;
        };
        let Some(redis::Value::Bulk(entries)) = parts.into_iter().nth(1) else {
            continue;
        };
        for entry in entries {
            if let Some(parsed) = parse_entry(entry) {
                out.push(parsed);
            }
        }
    }
    out
}

/// Entry format: [entry_id, [field, value, ...]]. Entries missing the
/// `topic` or `payload` field are skipped; they were not written by this
/// bus.
fn parse_entry(entry: redis::Value) -> Option<(String, String, Value)> {
    let redis::Value::Bulk(parts) = entry else {
        return None;
    };
    let mut parts = parts.into_iter();
    let id = match parts.next() {
        Some(redis::Value::Data(data)) => String::from_utf8_lossy(&data).into_owned(),
        _ => return None,
    };
    let fields = match parts.next() {
        Some(redis::Value::Bulk(fields)) => fields,
        _ => return None,
    };

    let mut topic = None;
    let mut payload = None;
    for chunk in fields.chunks(2) {
        if let [redis::Value::Data(key), redis::Value::Data(value)] = chunk {
            match key.as_slice() {
                b"topic" => topic = Some(String::from_utf8_lossy(value).into_owned()),
                b"payload" => payload = serde_json::from_slice(value).ok(),
                _ => {}
            }
        }
    }
    match (topic, payload) {
        (Some(topic), Some(payload)) => Some((id, topic, payload)),
        _ => {
            warn!(entry = %id, "stream entry missing topic or payload, skipping");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(bytes: &str) -> redis::Value {
        redis::Value::Data(bytes.as_bytes().to_vec())
    }

    #[test]
    fn entry_fields_decode_into_topic_and_payload() {
        let entry = redis::Value::Bulk(vec![
            data("1700000000000-0"),
            redis::Value::Bulk(vec![
                data("topic"),
                data("account.created"),
                data("payload"),
                data(r#"{"id":"a-1"}"#),
            ]),
        ]);

        let (id, topic, payload) = parse_entry(entry).unwrap();

        assert_eq!(id, "1700000000000-0");
        assert_eq!(topic, "account.created");
        assert_eq!(payload, json!({"id": "a-1"}));
    }

    #[test]
    fn foreign_entries_are_skipped() {
        let entry = redis::Value::Bulk(vec![
            data("1-0"),
            redis::Value::Bulk(vec![data("something"), data("else")]),
        ]);

        assert!(parse_entry(entry).is_none());
    }

    #[test]
    fn read_reply_flattens_across_streams() {
        let reply = redis::Value::Bulk(vec![redis::Value::Bulk(vec![
            data("vendhub:queue:events"),
            redis::Value::Bulk(vec![redis::Value::Bulk(vec![
                data("2-0"),
                redis::Value::Bulk(vec![
                    data("topic"),
                    data("store.updated"),
                    data("payload"),
                    data("{}"),
                ]),
            ])]),
        ])]);

        let entries = parse_reply(reply);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1, "store.updated");
    }
}
