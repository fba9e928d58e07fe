//! Routing from delivered topics to units of work.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use vendhub_core::{DomainError, Response};

use crate::topic::TopicPattern;

/// One unit of work over a delivered message.
///
/// Implementations run on the consumer's critical path: the delivery is not
/// settled until this returns, and errors are turned into dead-letter or
/// nack decisions by the caller. They must therefore never panic on
/// malformed payloads; reject with an error instead.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, topic: &str, payload: Value) -> Result<Response, DomainError>;
}

#[async_trait]
impl<H> EventHandler for Arc<H>
where
    H: EventHandler + ?Sized,
{
    async fn handle(&self, topic: &str, payload: Value) -> Result<Response, DomainError> {
        (**self).handle(topic, payload).await
    }
}

/// First-match routing table from topic patterns to handlers.
#[derive(Default)]
pub struct TopicRouter {
    routes: Vec<(TopicPattern, Arc<dyn EventHandler>)>,
}

impl TopicRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, pattern: impl Into<TopicPattern>, handler: Arc<dyn EventHandler>) -> Self {
        self.routes.push((pattern.into(), handler));
        self
    }

    pub fn resolve(&self, topic: &str) -> Option<Arc<dyn EventHandler>> {
        self.routes
            .iter()
            .find(|(pattern, _)| pattern.matches(topic))
            .map(|(_, handler)| Arc::clone(handler))
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tagged(&'static str);

    #[async_trait]
    impl EventHandler for Tagged {
        async fn handle(&self, _topic: &str, _payload: Value) -> Result<Response, DomainError> {
            Ok(Response::ok(self.0))
        }
    }

    #[tokio::test]
    async fn first_matching_pattern_wins() {
        let router = TopicRouter::new()
            .route("account.*", Arc::new(Tagged("accounts")))
            .route("#", Arc::new(Tagged("fallback")));

        let handler = router.resolve("account.created").unwrap();
        let resp = handler.handle("account.created", Value::Null).await.unwrap();
        assert_eq!(resp.message, "accounts");

        let handler = router.resolve("store.created").unwrap();
        let resp = handler.handle("store.created", Value::Null).await.unwrap();
        assert_eq!(resp.message, "fallback");
    }

    #[test]
    fn unrouted_topics_resolve_to_none() {
        let router = TopicRouter::new().route("account.*", Arc::new(Tagged("accounts")));
        assert!(router.resolve("payment.created").is_none());
    }
}
