//! Runtime-selected bus backend.

use crate::bus::{Bus, BusMessage};
use crate::{MemoryBus, RedisBus, TransportResult};
use serde_json::Value;
use tokio::sync::mpsc;

/// Bus backend chosen at startup: Redis for multi-process deployments, the
/// in-memory bus for single-process runs and tests.
pub enum AnyBus {
    /// In-process bus.
    Memory(MemoryBus),
    /// Redis-backed bus.
    Redis(RedisBus),
}

impl Bus for AnyBus {
    async fn publish(&self, channels: &[String], payload: Value) -> TransportResult<()> {
        match self {
            AnyBus::Memory(bus) => bus.publish(channels, payload).await,
            AnyBus::Redis(bus) => bus.publish(channels, payload).await,
        }
    }

    async fn subscribe(&self, channel: &str) -> TransportResult<mpsc::Receiver<BusMessage>> {
        match self {
            AnyBus::Memory(bus) => bus.subscribe(channel).await,
            AnyBus::Redis(bus) => bus.subscribe(channel).await,
        }
    }

    async fn unsubscribe(&self, channel: &str) -> TransportResult<()> {
        match self {
            AnyBus::Memory(bus) => bus.unsubscribe(channel).await,
            AnyBus::Redis(bus) => bus.unsubscribe(channel).await,
        }
    }

    async fn close(&self) -> TransportResult<()> {
        match self {
            AnyBus::Memory(bus) => bus.close().await,
            AnyBus::Redis(bus) => bus.close().await,
        }
    }
}
