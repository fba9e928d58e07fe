//! Runtime profiles: which stores and which bus a node runs against.
//!
//! The in-memory profile wires every replicated domain over
//! [`InMemoryRepository`] and [`InMemoryBus`]; the persistent one puts the
//! same handler graph on Postgres repositories behind Redis Streams. Both
//! expose the identical command and event surface, so tests exercise the
//! exact wiring production runs.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use vendhub_catalog::{Category, Operation, Price, Product, ProductType};
use vendhub_directory::{Account, Company, Customer, Employee, Store};
use vendhub_events::{
    BusError, HandlerConfig, InMemoryBus, MessageBus, QueueSpec, TopicRouter, Topology,
};
use vendhub_finance::{BankAccount, Payout, Transaction, Voucher};
use vendhub_infra::{ConsumerHandle, spawn_command_consumer, spawn_consumer};
use vendhub_service::{
    ApprovePayout, CommandRegistry, EntityService, ReplicaHandler, RequiredFields,
    register_queries, register_writes,
};
use vendhub_store::{InMemoryRepository, Persistable, Repository};

#[cfg(feature = "redis")]
use sqlx::PgPool;
#[cfg(feature = "redis")]
use vendhub_infra::{PostgresRepository, RedisStreamsBus};

use crate::config::AppConfig;

/// Every replicated domain, in declaration order.
pub fn replicated_domains() -> Vec<&'static str> {
    vendhub_directory::descriptors()
        .iter()
        .chain(vendhub_catalog::descriptors().iter())
        .chain(vendhub_finance::descriptors().iter())
        .map(|descriptor| descriptor.domain)
        .collect()
}

/// Queue topology a node declares before consuming: the shared work queue
/// bound to `<domain>.*` for every domain, the per-domain parking queues,
/// and the point-to-point command queue.
pub fn topology(config: &AppConfig) -> Topology {
    let domains = replicated_domains();
    Topology::replication(&config.events_queue, &domains)
        .queue(QueueSpec::point_to_point(&config.commands_queue))
}

/// Handler graph plus transport for one profile.
pub enum AppServices {
    /// Volatile stores on an in-process bus. The default.
    InMemory {
        bus: Arc<InMemoryBus>,
        router: Arc<TopicRouter>,
        registry: Arc<CommandRegistry>,
    },
    /// Postgres repositories on a Redis Streams bus.
    #[cfg(feature = "redis")]
    Persistent {
        bus: RedisStreamsBus,
        router: Arc<TopicRouter>,
        registry: Arc<CommandRegistry>,
    },
}

impl AppServices {
    /// Declares the topology and spawns the event and command consumers.
    /// The returned handles finish once `shutdown` flips to true.
    pub async fn start(
        &self,
        config: &AppConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Vec<ConsumerHandle>, BusError> {
        match self {
            AppServices::InMemory { bus, router, registry } => {
                start_consumers(
                    Arc::clone(bus),
                    Arc::clone(router),
                    Arc::clone(registry),
                    config,
                    shutdown,
                )
                .await
            }
            #[cfg(feature = "redis")]
            AppServices::Persistent { bus, router, registry } => {
                start_consumers(
                    bus.clone(),
                    Arc::clone(router),
                    Arc::clone(registry),
                    config,
                    shutdown,
                )
                .await
            }
        }
    }
}

pub async fn build_services(config: &AppConfig) -> AppServices {
    if config.use_persistent {
        #[cfg(feature = "redis")]
        {
            return build_persistent_services(config).await;
        }
        #[cfg(not(feature = "redis"))]
        {
            tracing::warn!(
                "USE_PERSISTENT_STORES=true but redis feature not enabled, falling back to in-memory"
            );
            return build_in_memory_services();
        }
    }

    build_in_memory_services()
}

pub fn build_in_memory_services() -> AppServices {
    let (router, registry) = wire_in_memory();
    AppServices::InMemory {
        bus: Arc::new(InMemoryBus::new()),
        router,
        registry,
    }
}

#[cfg(feature = "redis")]
async fn build_persistent_services(config: &AppConfig) -> AppServices {
    let database_url = config
        .database_url
        .as_deref()
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");
    let pool = PgPool::connect(database_url)
        .await
        .expect("failed to connect to Postgres");
    let bus = RedisStreamsBus::connect(&config.redis_url, config.consumer_name.clone())
        .await
        .expect("failed to connect to Redis");

    let (router, registry) = wire_postgres(&Arc::new(pool));
    AppServices::Persistent { bus, router, registry }
}

async fn start_consumers<B>(
    bus: B,
    router: Arc<TopicRouter>,
    registry: Arc<CommandRegistry>,
    config: &AppConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<Vec<ConsumerHandle>, BusError>
where
    B: MessageBus + Clone + 'static,
{
    bus.declare(&topology(config)).await?;

    let mut handler_config = HandlerConfig::new(&config.events_queue);
    if !config.use_dead_letter {
        handler_config = handler_config.without_dead_letter();
    }

    let events = spawn_consumer(bus.clone(), router, handler_config, shutdown.clone()).await?;
    let commands =
        spawn_command_consumer(bus, &config.commands_queue, registry, shutdown).await?;
    info!(
        events_queue = %config.events_queue,
        commands_queue = %config.commands_queue,
        "consumers running"
    );
    Ok(vec![events, commands])
}

/// One ordinary replicated domain: read commands plus a replica handler on
/// `<domain>.*`. Shape rules only bite on command writes and enforced
/// replicas; event payloads stay trusted.
fn replicate<E: Persistable>(
    router: TopicRouter,
    registry: &mut CommandRegistry,
    repo: Arc<dyn Repository<E>>,
    required: &'static [&'static str],
) -> TopicRouter {
    let service = EntityService::new(repo).with_shape(Arc::new(RequiredFields::new(required)));
    register_queries(registry, &service);
    router.route(
        format!("{}.*", E::descriptor().domain),
        Arc::new(ReplicaHandler::new(service)),
    )
}

fn wire_in_memory() -> (Arc<TopicRouter>, Arc<CommandRegistry>) {
    let mut registry = CommandRegistry::new();
    let mut router = TopicRouter::new();

    router = replicate::<Account>(router, &mut registry, in_memory(), &["name"]);
    router = replicate::<Company>(router, &mut registry, in_memory(), &["name"]);
    router = replicate::<Store>(router, &mut registry, in_memory(), &["name"]);
    router = replicate::<Customer>(router, &mut registry, in_memory(), &["name"]);
    router = replicate::<Employee>(router, &mut registry, in_memory(), &["name"]);
    router = replicate::<Category>(router, &mut registry, in_memory(), &["name"]);
    router = replicate::<ProductType>(router, &mut registry, in_memory(), &["name"]);
    router = replicate::<Price>(router, &mut registry, in_memory(), &["amount"]);
    router = replicate::<Operation>(router, &mut registry, in_memory(), &["kind"]);
    router = replicate::<Product>(router, &mut registry, in_memory(), &["name"]);
    router = replicate::<Transaction>(router, &mut registry, in_memory(), &["amount"]);
    router = replicate::<Voucher>(router, &mut registry, in_memory(), &["code"]);

    let bank_accounts: Arc<dyn Repository<BankAccount>> = in_memory();
    let payouts: Arc<dyn Repository<Payout>> = in_memory();
    finish_wiring(router, registry, bank_accounts, payouts)
}

#[cfg(feature = "redis")]
fn wire_postgres(pool: &Arc<PgPool>) -> (Arc<TopicRouter>, Arc<CommandRegistry>) {
    let mut registry = CommandRegistry::new();
    let mut router = TopicRouter::new();

    router = replicate::<Account>(router, &mut registry, postgres(pool), &["name"]);
    router = replicate::<Company>(router, &mut registry, postgres(pool), &["name"]);
    router = replicate::<Store>(router, &mut registry, postgres(pool), &["name"]);
    router = replicate::<Customer>(router, &mut registry, postgres(pool), &["name"]);
    router = replicate::<Employee>(router, &mut registry, postgres(pool), &["name"]);
    router = replicate::<Category>(router, &mut registry, postgres(pool), &["name"]);
    router = replicate::<ProductType>(router, &mut registry, postgres(pool), &["name"]);
    router = replicate::<Price>(router, &mut registry, postgres(pool), &["amount"]);
    router = replicate::<Operation>(router, &mut registry, postgres(pool), &["kind"]);
    router = replicate::<Product>(router, &mut registry, postgres(pool), &["name"]);
    router = replicate::<Transaction>(router, &mut registry, postgres(pool), &["amount"]);
    router = replicate::<Voucher>(router, &mut registry, postgres(pool), &["code"]);

    let bank_accounts: Arc<dyn Repository<BankAccount>> = postgres(pool);
    let payouts: Arc<dyn Repository<Payout>> = postgres(pool);
    finish_wiring(router, registry, bank_accounts, payouts)
}

/// The two domains with extra command surface. Bank accounts are authored
/// here, so they get the full write set; payouts add the approval command,
/// which must share the replica's store.
fn finish_wiring(
    mut router: TopicRouter,
    mut registry: CommandRegistry,
    bank_accounts: Arc<dyn Repository<BankAccount>>,
    payouts: Arc<dyn Repository<Payout>>,
) -> (Arc<TopicRouter>, Arc<CommandRegistry>) {
    let bank_service = EntityService::new(bank_accounts)
        .with_shape(Arc::new(RequiredFields::new(&["holder_name"])));
    register_queries(&mut registry, &bank_service);
    register_writes(&mut registry, &bank_service);
    router = router.route("bank_account.*", Arc::new(ReplicaHandler::new(bank_service)));

    let payout_service = EntityService::new(Arc::clone(&payouts))
        .with_shape(Arc::new(RequiredFields::new(&["amount"])));
    register_queries(&mut registry, &payout_service);
    registry.register("payout.approve", Arc::new(ApprovePayout::new(payouts)));
    router = router.route("payout.*", Arc::new(ReplicaHandler::new(payout_service)));

    (Arc::new(router), Arc::new(registry))
}

fn in_memory<E: Persistable>() -> Arc<dyn Repository<E>> {
    Arc::new(InMemoryRepository::<E>::new())
}

#[cfg(feature = "redis")]
fn postgres<E: Persistable>(pool: &Arc<PgPool>) -> Arc<dyn Repository<E>> {
    Arc::new(PostgresRepository::<E>::with_pool(Arc::clone(pool)))
}
