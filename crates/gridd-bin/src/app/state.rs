//! Shared daemon state.

use doc_store::DocStore;
use gridd_config_and_utils::{Config, Paths};
use presence_registry::PresenceRegistry;
use pubsub_transport::AnyBus;
use std::sync::Arc;

/// Shared daemon state (thread-safe).
///
/// Every resource here is process-wide: created once at startup, shared by
/// all connection handlers, torn down together on shutdown. No per-request
/// connections.
#[derive(Clone)]
pub struct AppState {
    /// Resolved configuration.
    #[allow(dead_code)]
    pub config: Arc<Config>,
    /// Runtime paths.
    #[allow(dead_code)]
    pub paths: Arc<Paths>,
    /// The OT document store.
    pub store: Arc<DocStore>,
    /// Presence fabric over the process-wide bus.
    pub registry: Arc<PresenceRegistry<AnyBus>>,
}
