//! Process configuration, read once from the environment at startup.

/// Runtime settings for a replication node.
///
/// Everything has a development default except `DATABASE_URL`, which the
/// persistent profile insists on. Consumer names must be unique per process
/// within a queue group, so the default appends a fresh id.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string. Only required when `use_persistent` is on.
    pub database_url: Option<String>,
    pub redis_url: String,
    /// Work queue every replicated domain binds to.
    pub events_queue: String,
    /// Point-to-point queue for synchronous commands.
    pub commands_queue: String,
    /// This process's name within the consumer groups.
    pub consumer_name: String,
    /// Park failed deliveries on `dlq.*` routes instead of dropping them.
    pub use_dead_letter: bool,
    /// Postgres + Redis Streams instead of the in-memory profile.
    pub use_persistent: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let use_persistent = std::env::var("USE_PERSISTENT_STORES")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            events_queue: std::env::var("VENDHUB_EVENTS_QUEUE")
                .unwrap_or_else(|_| "vendhub.events".to_string()),
            commands_queue: std::env::var("VENDHUB_COMMANDS_QUEUE")
                .unwrap_or_else(|_| "vendhub.commands".to_string()),
            consumer_name: std::env::var("VENDHUB_CONSUMER_NAME")
                .unwrap_or_else(|_| format!("consumer-{}", uuid::Uuid::now_v7())),
            use_dead_letter: std::env::var("VENDHUB_USE_DEAD_LETTER")
                .unwrap_or_else(|_| "true".to_string())
                .parse::<bool>()
                .unwrap_or(true),
            use_persistent,
        }
    }
}
