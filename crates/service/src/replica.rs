//! Event-channel adapter: replication topics onto an [`EntityService`].

use async_trait::async_trait;
use serde_json::Value;

use vendhub_core::{DomainError, Response};
use vendhub_events::EventHandler;
use vendhub_store::Persistable;

use crate::service::EntityService;

/// Dispatches `<domain>.<action>` events to the matching replica write.
///
/// One handler instance serves all four actions of its domain; the router
/// binds it under the `<domain>.*` pattern. Unsupported actions are an
/// error, so they dead-letter instead of vanishing.
pub struct ReplicaHandler<E: Persistable> {
    service: EntityService<E>,
}

impl<E: Persistable> ReplicaHandler<E> {
    pub fn new(service: EntityService<E>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<E: Persistable> EventHandler for ReplicaHandler<E> {
    async fn handle(&self, topic: &str, payload: Value) -> Result<Response, DomainError> {
        let action = topic.rsplit('.').next().unwrap_or(topic);
        let response = match action {
            "created" => self.service.replicate_created(payload).await,
            "updated" => self.service.replicate_updated(payload).await,
            "deleted" => self.service.replicate_deleted(payload).await,
            "sync" => self.service.sync(payload).await,
            other => {
                return Err(DomainError::invalid(
                    "topic",
                    format!("unsupported action `{other}`"),
                    "unsupported_action",
                ));
            }
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use vendhub_core::EntityId;
    use vendhub_directory::Account;
    use vendhub_store::{Filter, InMemoryRepository, Repository};

    fn handler(repo: Arc<InMemoryRepository<Account>>) -> ReplicaHandler<Account> {
        ReplicaHandler::new(EntityService::new(repo))
    }

    #[tokio::test]
    async fn routes_each_action_to_its_write() {
        let repo = Arc::new(InMemoryRepository::new());
        let handler = handler(Arc::clone(&repo));

        let created = handler
            .handle("account.created", json!({ "id": "acc-1", "name": "Acme" }))
            .await
            .unwrap();
        let updated = handler
            .handle("account.updated", json!({ "id": "acc-1", "name": "Acme GmbH" }))
            .await
            .unwrap();
        let deleted = handler
            .handle("account.deleted", json!({ "id": "acc-1" }))
            .await
            .unwrap();

        assert!(created.success && updated.success && deleted.success);
        let gone = repo
            .find_one(&EntityId::from("acc-1"), &Filter::new())
            .await
            .unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn update_before_create_converges_on_the_updated_state() {
        let repo = Arc::new(InMemoryRepository::new());
        let handler = handler(Arc::clone(&repo));

        handler
            .handle("account.updated", json!({ "id": "acc-9", "name": "Late" }))
            .await
            .unwrap();
        handler
            .handle("account.created", json!({ "id": "acc-9", "name": "Early" }))
            .await
            .unwrap();

        let stored = repo
            .find_one(&EntityId::from("acc-9"), &Filter::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.name, "Late");
        let total = repo.count(&Filter::new()).await.unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn sync_action_upserts_the_whole_batch() {
        let repo = Arc::new(InMemoryRepository::new());
        let handler = handler(Arc::clone(&repo));

        let response = handler
            .handle(
                "account.sync",
                json!([
                    { "id": "acc-1", "name": "Acme" },
                    { "id": "acc-2", "name": "Globex" },
                ]),
            )
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(repo.count(&Filter::new()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unsupported_action_is_an_error() {
        let handler = handler(Arc::new(InMemoryRepository::new()));

        let result = handler.handle("account.archived", json!({})).await;

        assert!(result.is_err());
    }
}
