//! Declarative queue topology, declared once at process start.

use crate::topic::TopicPattern;

/// A queue plus the binding patterns that feed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    name: String,
    bindings: Vec<TopicPattern>,
}

impl QueueSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: Vec::new(),
        }
    }

    /// Point-to-point channel: the queue is bound to its own name, so
    /// publishing to that exact key is the only way in.
    pub fn point_to_point(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(name.clone()).bind(name)
    }

    pub fn bind(mut self, pattern: impl Into<TopicPattern>) -> Self {
        self.bindings.push(pattern.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bindings(&self) -> &[TopicPattern] {
        &self.bindings
    }
}

/// Every queue the process consumes, with its bindings.
///
/// Declared idempotently on every boot: redeclaring identical topology is a
/// no-op, redeclaring a queue with different bindings is a fatal startup
/// error surfaced by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    queues: Vec<QueueSpec>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(mut self, spec: QueueSpec) -> Self {
        self.queues.push(spec);
        self
    }

    pub fn queues(&self) -> &[QueueSpec] {
        &self.queues
    }

    /// Standard replication topology: one durable work queue bound to
    /// `<domain>.*` for every replicated domain, plus a parking queue per
    /// domain bound to `dlq.<domain>.*` so dead-letter routes exist before
    /// any message can fail.
    pub fn replication(work_queue: &str, domains: &[&str]) -> Self {
        let mut work = QueueSpec::new(work_queue);
        for domain in domains {
            work = work.bind(format!("{domain}.*"));
        }
        let mut topology = Self::new().queue(work);
        for domain in domains {
            topology = topology.queue(
                QueueSpec::new(dead_letter_queue(domain)).bind(format!("dlq.{domain}.*")),
            );
        }
        topology
    }
}

/// Routing key that parks a failed message from `topic`.
pub fn dead_letter_key(topic: &str) -> String {
    format!("dlq.{topic}")
}

/// Name of the parking queue for one domain's failed messages.
pub fn dead_letter_queue(domain: &str) -> String {
    format!("dlq.{domain}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replication_topology_covers_domains_and_their_dlqs() {
        let topology = Topology::replication("events", &["account", "store"]);
        let queues = topology.queues();
        assert_eq!(queues.len(), 3);

        assert_eq!(queues[0].name(), "events");
        assert!(queues[0].bindings().iter().any(|p| p.matches("account.created")));
        assert!(queues[0].bindings().iter().any(|p| p.matches("store.sync")));
        assert!(!queues[0].bindings().iter().any(|p| p.matches("dlq.account.created")));

        assert_eq!(queues[1].name(), "dlq.account");
        assert!(queues[1].bindings()[0].matches("dlq.account.created"));
        assert_eq!(queues[2].name(), "dlq.store");
    }

    #[test]
    fn dead_letter_key_prefixes_the_topic() {
        assert_eq!(dead_letter_key("account.created"), "dlq.account.created");
        assert_eq!(dead_letter_queue("account"), "dlq.account");
    }

    #[test]
    fn point_to_point_queue_is_bound_to_its_own_name() {
        let spec = QueueSpec::point_to_point("commands");
        assert_eq!(spec.name(), "commands");
        assert!(spec.bindings()[0].matches("commands"));
        assert!(!spec.bindings()[0].matches("commands.other"));
    }
}
