use tokio::sync::watch;

use vendhub_app::{AppConfig, build_services};

#[tokio::main]
async fn main() {
    vendhub_observability::init();

    let config = AppConfig::from_env();
    let services = build_services(&config).await;

    let (shutdown, consumers_shutdown) = watch::channel(false);
    let handles = services
        .start(&config, consumers_shutdown)
        .await
        .expect("failed to declare queues and start consumers");

    tracing::info!(consumer = %config.consumer_name, "vendhub node running");

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl-c");
    tracing::info!("shutting down");
    let _ = shutdown.send(true);
    for handle in handles {
        handle.join().await;
    }
}
