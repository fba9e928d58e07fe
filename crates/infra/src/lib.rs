//! Infrastructure layer: Postgres repository, Redis Streams bus, consumer
//! loops. Everything here implements a contract from `vendhub-store` or
//! `vendhub-events`; swapping a backend never touches the services.

pub mod consumer;
pub mod postgres;
#[cfg(feature = "redis")]
pub mod redis_streams;

#[cfg(test)]
mod integration_tests;

pub use consumer::{ConsumerHandle, ConsumerStats, spawn_command_consumer, spawn_consumer};
pub use postgres::PostgresRepository;
#[cfg(feature = "redis")]
pub use redis_streams::RedisStreamsBus;
