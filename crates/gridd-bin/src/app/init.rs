//! Daemon startup and ordered shutdown.

use crate::app::AppState;
use crate::bridge;
use doc_store::{Database, DocStore};
use gridd_config_and_utils::{Config, Paths};
use presence_registry::PresenceRegistry;
use pubsub_transport::{AnyBus, MemoryBus, RedisBus};
use std::sync::Arc;
use tracing::info;

/// Build the process-wide resources and run until a shutdown signal.
pub async fn run(config: Config, paths: Paths, memory_bus: bool) -> anyhow::Result<()> {
    paths.ensure_dirs()?;

    let state = build_state(config, paths, memory_bus).await?;

    // Bridge committed document changes onto the presence fabric so
    // subscribers on any process observe version bumps. Subscribed before
    // any command can commit.
    let bridge_task = tokio::spawn(bridge::run(state.store.changes(), state.registry.clone()));

    info!("gridd running; press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    // Ordered teardown: stop producing bridge traffic, then drain the
    // presence registry and close the bus connections together.
    bridge_task.abort();
    state.registry.shutdown().await?;

    info!("Shutdown complete");
    Ok(())
}

/// Construct the shared state: database, store, bus, registry.
pub async fn build_state(
    config: Config,
    paths: Paths,
    memory_bus: bool,
) -> anyhow::Result<AppState> {
    let db = Arc::new(Database::open(&config.database_path(&paths))?);
    let store = Arc::new(DocStore::new(db));

    let bus = if memory_bus {
        info!("Using in-process bus");
        AnyBus::Memory(MemoryBus::new())
    } else {
        AnyBus::Redis(RedisBus::connect(&config.redis_url).await?)
    };
    let registry = Arc::new(PresenceRegistry::new(Arc::new(bus)));

    Ok(AppState {
        config: Arc::new(config),
        paths: Arc::new(paths),
        store,
        registry,
    })
}
