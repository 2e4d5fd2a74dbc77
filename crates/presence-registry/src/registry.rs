//! The presence registry.
//!
//! Ephemeral per-resource state: active cells, collaborator cursors, live
//! row counts. Entries are keyed by channel and client, replaced wholesale
//! on every publish (last-write-wins, no merge), never persisted, and
//! garbage-collected when a client disconnects.
//!
//! The registry is an explicit object with an injected bus: constructed at
//! process start, drained on shutdown. Tests run as many isolated
//! instances as they like.

use crate::action_buffer::{ActionTriggerBuffer, TriggeredAction};
use crate::{channels, PresenceResult};
use pubsub_transport::{Bus, SUBSCRIBER_BUFFER};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// One presence update as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceMessage {
    /// Channel the update belongs to.
    pub channel: String,
    /// Connection-scoped publisher id.
    #[serde(rename = "clientId")]
    pub client_id: String,
    /// New payload, or `None` to clear the client's entry.
    pub payload: Option<Value>,
}

/// Channel -> client -> current payload.
type EntryMap = HashMap<String, HashMap<String, Value>>;

/// Ephemeral presence state over a bus.
pub struct PresenceRegistry<B: Bus> {
    bus: Arc<B>,
    entries: Mutex<EntryMap>,
    actions: ActionTriggerBuffer,
}

impl<B: Bus> PresenceRegistry<B> {
    /// Create a registry over a connected bus.
    pub fn new(bus: Arc<B>) -> Self {
        Self {
            bus,
            entries: Mutex::new(HashMap::new()),
            actions: ActionTriggerBuffer::new(),
        }
    }

    /// The underlying bus.
    pub fn bus(&self) -> &Arc<B> {
        &self.bus
    }

    /// Publish a client's presence payload to one channel.
    ///
    /// `None` clears the client's entry. Either way the update replaces
    /// whatever was there; there are no merge semantics.
    pub async fn publish(
        &self,
        channel: &str,
        client_id: &str,
        payload: Option<Value>,
    ) -> PresenceResult<()> {
        self.store_entry(channel, client_id, payload.clone()).await;

        let message = PresenceMessage {
            channel: channel.to_string(),
            client_id: client_id.to_string(),
            payload,
        };
        self.bus
            .publish(
                std::slice::from_ref(&message.channel),
                serde_json::to_value(&message)?,
            )
            .await?;

        Ok(())
    }

    /// Publish one payload to several channels as a single atomic fan-out
    /// (e.g. a cursor update mirrored to cell presence and collaborators).
    pub async fn publish_to_all(
        &self,
        channels: &[String],
        client_id: &str,
        payload: Option<Value>,
    ) -> PresenceResult<()> {
        for channel in channels {
            self.store_entry(channel, client_id, payload.clone()).await;
        }

        // The channel field names the primary target; receivers see the
        // channel they subscribed on from the bus envelope.
        let message = PresenceMessage {
            channel: channels.first().cloned().unwrap_or_default(),
            client_id: client_id.to_string(),
            payload,
        };
        self.bus
            .publish(channels, serde_json::to_value(&message)?)
            .await?;

        Ok(())
    }

    /// Subscribe to a channel's presence stream.
    ///
    /// Delivery is at-most-once per publish in publish order; there is no
    /// replay. Late joiners read [`PresenceRegistry::snapshot`] instead.
    pub async fn subscribe(
        &self,
        channel: &str,
    ) -> PresenceResult<mpsc::Receiver<PresenceMessage>> {
        let mut raw = self.bus.subscribe(channel).await?;
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);

        let channel = channel.to_string();
        tokio::spawn(async move {
            while let Some(msg) = raw.recv().await {
                match serde_json::from_value::<PresenceMessage>(msg.payload) {
                    Ok(presence) => {
                        if tx.send(presence).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "Dropping malformed presence message");
                    }
                }
            }
            // Bus receiver closed: dropping tx surfaces the break
        });

        Ok(rx)
    }

    /// Drop local subscriptions to a channel.
    pub async fn unsubscribe(&self, channel: &str) -> PresenceResult<()> {
        self.bus.unsubscribe(channel).await?;
        Ok(())
    }

    /// Current entries on a channel, for late joiners that re-fetch.
    pub async fn snapshot(&self, channel: &str) -> HashMap<String, Value> {
        let entries = self.entries.lock().await;
        entries.get(channel).cloned().unwrap_or_default()
    }

    /// Clear a disconnected client's entries everywhere, broadcasting the
    /// clear on each affected channel.
    pub async fn disconnect(&self, client_id: &str) -> PresenceResult<()> {
        let affected: Vec<String> = {
            let mut entries = self.entries.lock().await;
            let affected = entries
                .iter()
                .filter(|(_, clients)| clients.contains_key(client_id))
                .map(|(channel, _)| channel.clone())
                .collect::<Vec<_>>();
            for channel in &affected {
                if let Some(clients) = entries.get_mut(channel) {
                    clients.remove(client_id);
                    if clients.is_empty() {
                        entries.remove(channel);
                    }
                }
            }
            affected
        };

        for channel in &affected {
            let message = PresenceMessage {
                channel: channel.clone(),
                client_id: client_id.to_string(),
                payload: None,
            };
            self.bus
                .publish(
                    std::slice::from_ref(channel),
                    serde_json::to_value(&message)?,
                )
                .await?;
        }

        if !affected.is_empty() {
            debug!(client_id = %client_id, channels = affected.len(), "Cleared presence on disconnect");
        }
        Ok(())
    }

    /// Record a high-level action and notify the channel's subscribers.
    pub async fn trigger_action(&self, table_id: &str, action: &str) -> PresenceResult<u64> {
        let channel = channels::action_trigger(table_id);
        let seq = self.actions.push(&channel, action).await;

        let message = PresenceMessage {
            channel: channel.clone(),
            client_id: "server".to_string(),
            payload: Some(serde_json::json!({ "seq": seq, "action": action })),
        };
        self.bus
            .publish(
                std::slice::from_ref(&channel),
                serde_json::to_value(&message)?,
            )
            .await?;

        Ok(seq)
    }

    /// Actions recorded for a table since the client's last poll.
    pub async fn actions_since(&self, table_id: &str, after_seq: u64) -> Vec<TriggeredAction> {
        self.actions
            .since(&channels::action_trigger(table_id), after_seq)
            .await
    }

    /// Drain all presence state and close the bus. Terminal.
    pub async fn shutdown(&self) -> PresenceResult<()> {
        self.entries.lock().await.clear();
        self.bus.close().await?;
        info!("Presence registry drained");
        Ok(())
    }

    async fn store_entry(&self, channel: &str, client_id: &str, payload: Option<Value>) {
        let mut entries = self.entries.lock().await;
        match payload {
            Some(value) => {
                entries
                    .entry(channel.to_string())
                    .or_default()
                    .insert(client_id.to_string(), value);
            }
            None => {
                if let Some(clients) = entries.get_mut(channel) {
                    clients.remove(client_id);
                    if clients.is_empty() {
                        entries.remove(channel);
                    }
                }
            }
        }
    }
}
