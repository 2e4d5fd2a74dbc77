//! The bus contract all higher layers build on.

use crate::TransportResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use tokio::sync::mpsc;

/// Per-subscriber delivery buffer. A subscriber that falls further behind
/// than this misses messages rather than backing up the bus (delivery is
/// at-most-once per publish, never queued).
pub const SUBSCRIBER_BUFFER: usize = 64;

/// One message delivered to a channel subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    /// Channel the message arrived on.
    pub channel: String,
    /// Opaque payload.
    pub payload: Value,
}

/// Process-to-process channel fan-out.
///
/// A publish to multiple channels is atomic: either every channel's current
/// subscribers are reached or, on transport failure, none are marked
/// delivered. Within one channel, a given subscriber sees messages in
/// publish order.
pub trait Bus: Send + Sync + 'static {
    /// Publish one payload to every channel in `channels`.
    fn publish(
        &self,
        channels: &[String],
        payload: Value,
    ) -> impl Future<Output = TransportResult<()>> + Send;

    /// Subscribe to a channel. Messages published after this call resolves
    /// are delivered to the returned receiver; the receiver closing signals
    /// a transport break or an unsubscribe.
    fn subscribe(
        &self,
        channel: &str,
    ) -> impl Future<Output = TransportResult<mpsc::Receiver<BusMessage>>> + Send;

    /// Drop every local subscription to `channel`.
    fn unsubscribe(&self, channel: &str) -> impl Future<Output = TransportResult<()>> + Send;

    /// Stop listeners, drop subscriptions, and release connections.
    /// Idempotent.
    fn close(&self) -> impl Future<Output = TransportResult<()>> + Send;
}
