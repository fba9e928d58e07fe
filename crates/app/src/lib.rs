//! Node wiring: configuration, runtime profiles, and consumer startup.

pub mod config;
pub mod services;

pub use config::AppConfig;
pub use services::{AppServices, build_in_memory_services, build_services};
