//! End-to-end tests over the in-memory transport.
//!
//! Publish → queue → consumer → service → repository, with settlement and
//! dead-letter behavior observed from the outside. The Redis and Postgres
//! backends implement the same contracts, so everything here describes the
//! production pipeline as well.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::watch;
    use tokio::time::{sleep, timeout};

    use vendhub_core::EntityId;
    use vendhub_directory::Account;
    use vendhub_events::{
        HandlerConfig, InMemoryBus, MessageBus, QueueSpec, TopicRouter, Topology,
    };
    use vendhub_service::{
        CommandRegistry, EntityService, ReplicaHandler, register_queries,
    };
    use vendhub_store::{Filter, InMemoryRepository, ListQuery, Repository};

    use crate::consumer::{ConsumerHandle, ConsumerStats, spawn_command_consumer, spawn_consumer};

    struct Pipeline {
        bus: Arc<InMemoryBus>,
        repo: Arc<InMemoryRepository<Account>>,
        handle: ConsumerHandle,
        _stop: watch::Sender<bool>,
    }

    async fn replication_pipeline() -> Pipeline {
        let bus = Arc::new(InMemoryBus::new());
        bus.declare(&Topology::replication("vendhub.events", &["account"]))
            .await
            .unwrap();

        let repo: Arc<InMemoryRepository<Account>> = Arc::new(InMemoryRepository::new());
        let service = EntityService::new(Arc::clone(&repo) as Arc<dyn Repository<Account>>);
        let router = Arc::new(
            TopicRouter::new().route("account.*", Arc::new(ReplicaHandler::new(service))),
        );

        let (stop, watch_rx) = watch::channel(false);
        let handle = spawn_consumer(
            bus.clone(),
            router,
            HandlerConfig::new("vendhub.events"),
            watch_rx,
        )
        .await
        .unwrap();

        Pipeline {
            bus,
            repo,
            handle,
            _stop: stop,
        }
    }

    async fn settled(stats: &ConsumerStats, processed: u64) {
        timeout(Duration::from_secs(2), async {
            while stats.processed() < processed {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("consumer did not settle in time");
    }

    #[tokio::test]
    async fn crud_lifecycle_replicates_through_the_queue() {
        let pipeline = replication_pipeline().await;
        let stats = pipeline.handle.stats();

        pipeline
            .bus
            .publish("account.created", &json!({"id": "a-1", "name": "Acme"}))
            .await
            .unwrap();
        pipeline
            .bus
            .publish("account.updated", &json!({"id": "a-1", "name": "Acme GmbH"}))
            .await
            .unwrap();
        settled(&stats, 2).await;

        let id = EntityId::from("a-1");
        let stored = pipeline.repo.find_one(&id, &Filter::new()).await.unwrap().unwrap();
        assert_eq!(stored.name, "Acme GmbH");

        pipeline.bus.publish("account.deleted", &json!({"id": "a-1"})).await.unwrap();
        settled(&stats, 3).await;

        assert!(pipeline.repo.find_one(&id, &Filter::new()).await.unwrap().is_none());
        assert_eq!(stats.completed(), 3);
        assert_eq!(stats.dead_lettered(), 0);
    }

    #[tokio::test]
    async fn update_arriving_before_create_converges_on_the_update() {
        let pipeline = replication_pipeline().await;
        let stats = pipeline.handle.stats();

        pipeline
            .bus
            .publish("account.updated", &json!({"id": "a-7", "name": "Late Writer"}))
            .await
            .unwrap();
        pipeline
            .bus
            .publish("account.created", &json!({"id": "a-7", "name": "Early Writer"}))
            .await
            .unwrap();
        settled(&stats, 2).await;

        // Both settle as successes: the update upserted, the late create saw
        // the row already there.
        assert_eq!(stats.completed(), 2);
        let listing = pipeline.repo.find_all(&ListQuery::new()).await.unwrap();
        assert_eq!(listing.data.len(), 1);
        assert_eq!(listing.data[0].name, "Late Writer");
    }

    #[tokio::test]
    async fn sync_batch_upserts_idempotently() {
        let pipeline = replication_pipeline().await;
        let stats = pipeline.handle.stats();

        let batch = json!([
            {"id": "a-1", "name": "One"},
            {"id": "a-2", "name": "Two"},
        ]);
        pipeline.bus.publish("account.sync", &batch).await.unwrap();
        pipeline.bus.publish("account.sync", &batch).await.unwrap();
        settled(&stats, 2).await;

        assert_eq!(stats.completed(), 2);
        assert_eq!(pipeline.repo.count(&Filter::new()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn poison_message_parks_with_its_payload_and_reason() {
        let pipeline = replication_pipeline().await;
        let stats = pipeline.handle.stats();
        let mut dlq = pipeline.bus.subscribe("dlq.account").await.unwrap();

        pipeline.bus.publish("account.created", &json!("not an object")).await.unwrap();
        settled(&stats, 1).await;

        assert_eq!(stats.dead_lettered(), 1);
        let parked = dlq.recv().await.unwrap();
        assert_eq!(parked.topic(), "dlq.account.created");
        assert_eq!(parked.payload()["topic"], "account.created");
        assert_eq!(parked.payload()["payload"], json!("not an object"));
        assert!(parked.payload()["error"].as_str().unwrap().contains("payload"));
        // The original delivery was settled, not left in flight to loop.
        assert_eq!(pipeline.bus.acked(), 1);
    }

    #[tokio::test]
    async fn command_round_trip_reads_replicated_state() {
        let pipeline = replication_pipeline().await;
        let stats = pipeline.handle.stats();
        pipeline
            .bus
            .declare(
                &Topology::new()
                    .queue(QueueSpec::point_to_point("vendhub.commands"))
                    .queue(QueueSpec::point_to_point("test.replies")),
            )
            .await
            .unwrap();

        let service = EntityService::new(
            Arc::clone(&pipeline.repo) as Arc<dyn Repository<Account>>
        );
        let mut registry = CommandRegistry::new();
        register_queries(&mut registry, &service);
        let (_cmd_stop, watch_rx) = watch::channel(false);
        let cmd_handle = spawn_command_consumer(
            pipeline.bus.clone(),
            "vendhub.commands",
            Arc::new(registry),
            watch_rx,
        )
        .await
        .unwrap();

        pipeline
            .bus
            .publish("account.created", &json!({"id": "a-1", "name": "Acme"}))
            .await
            .unwrap();
        settled(&stats, 1).await;

        pipeline
            .bus
            .publish(
                "vendhub.commands",
                &json!({"cmd": "account.list", "payload": {}, "reply_to": "test.replies"}),
            )
            .await
            .unwrap();
        settled(&cmd_handle.stats(), 1).await;

        let mut replies = pipeline.bus.subscribe("test.replies").await.unwrap();
        let reply = replies.recv().await.unwrap();
        assert_eq!(reply.payload()["success"], true);
        assert_eq!(reply.payload()["statusCode"], 200);
        let listing = &reply.payload()["data"];
        assert_eq!(listing["data"].as_array().unwrap().len(), 1);
        assert_eq!(listing["data"][0]["name"], "Acme");
    }
}
