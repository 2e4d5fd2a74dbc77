//! In-process bus for tests and single-process deployments.

use crate::bus::{Bus, BusMessage, SUBSCRIBER_BUFFER};
use crate::{TransportError, TransportResult};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

struct MemoryBusInner {
    channels: HashMap<String, Vec<mpsc::Sender<BusMessage>>>,
    closed: bool,
}

/// In-memory bus with the same contract as the Redis adapter.
///
/// A single registry lock makes multi-channel publishes atomic: no
/// subscriber on any target channel can observe a partial fan-out.
pub struct MemoryBus {
    inner: Mutex<MemoryBusInner>,
}

impl MemoryBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryBusInner {
                channels: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Number of live subscribers on a channel.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        let inner = self.inner.lock().await;
        inner
            .channels
            .get(channel)
            .map(|senders| senders.iter().filter(|s| !s.is_closed()).count())
            .unwrap_or(0)
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for MemoryBus {
    async fn publish(&self, channels: &[String], payload: Value) -> TransportResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(TransportError::Closed);
        }

        for channel in channels {
            let Some(senders) = inner.channels.get_mut(channel) else {
                continue;
            };
            senders.retain(|sender| {
                let message = BusMessage {
                    channel: channel.clone(),
                    payload: payload.clone(),
                };
                // A full buffer means the subscriber lagged past its
                // at-most-once window; a closed one is gone.
                match sender.try_send(message) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Full(_)) => true,
                    Err(mpsc::error::TrySendError::Closed(_)) => false,
                }
            });
        }

        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> TransportResult<mpsc::Receiver<BusMessage>> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(TransportError::Closed);
        }

        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        inner
            .channels
            .entry(channel.to_string())
            .or_default()
            .push(tx);

        debug!(channel = %channel, "Subscribed");
        Ok(rx)
    }

    async fn unsubscribe(&self, channel: &str) -> TransportResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(TransportError::Closed);
        }

        // Dropping the senders closes every subscriber's receiver
        inner.channels.remove(channel);
        debug!(channel = %channel, "Unsubscribed");
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        let mut inner = self.inner.lock().await;
        inner.closed = true;
        inner.channels.clear();
        Ok(())
    }
}
