//! Redis-backed bus.
//!
//! Two connections, by protocol requirement: one multiplexed connection
//! issues commands (PUBLISH, scripts), a second dedicated connection stays
//! exclusively in subscribe mode. The constructor owns this invariant;
//! nothing else touches the subscribe connection.

use crate::bus::{Bus, BusMessage, SUBSCRIBER_BUFFER};
use crate::{TransportError, TransportResult};
use futures_util::StreamExt;
use redis::aio::{MultiplexedConnection, PubSubSink};
use redis::{Client, Script};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Multi-channel publish as one server-side script. EVAL executes
/// atomically on the server, so a partial fan-out (some channels notified,
/// others not) cannot occur.
const FANOUT_SCRIPT: &str = r#"
for i, channel in ipairs(KEYS) do
    redis.call('PUBLISH', channel, ARGV[1])
end
return #KEYS
"#;

type SubscriberMap = HashMap<String, Vec<mpsc::Sender<BusMessage>>>;

/// Redis pub/sub adapter.
pub struct RedisBus {
    publisher: MultiplexedConnection,
    fanout: Script,
    subs: Arc<Mutex<SubscriberMap>>,
    sink: Mutex<PubSubSink>,
    listener: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl RedisBus {
    /// Connect both bus connections and start the dispatch listener.
    pub async fn connect(redis_url: &str) -> TransportResult<Self> {
        let client = Client::open(redis_url)?;

        let publisher = client.get_multiplexed_async_connection().await?;
        let pubsub = client.get_async_pubsub().await?;
        let (sink, mut stream) = pubsub.split();

        let subs: Arc<Mutex<SubscriberMap>> = Arc::new(Mutex::new(HashMap::new()));

        let listener = {
            let subs = subs.clone();
            tokio::spawn(async move {
                while let Some(msg) = stream.next().await {
                    let channel = msg.get_channel_name().to_string();
                    let raw: String = match msg.get_payload() {
                        Ok(raw) => raw,
                        Err(e) => {
                            warn!(channel = %channel, error = %e, "Dropping undecodable message");
                            continue;
                        }
                    };
                    let payload: Value = match serde_json::from_str(&raw) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!(channel = %channel, error = %e, "Dropping non-JSON message");
                            continue;
                        }
                    };

                    let mut subs = subs.lock().await;
                    if let Some(senders) = subs.get_mut(&channel) {
                        senders.retain(|sender| {
                            let message = BusMessage {
                                channel: channel.clone(),
                                payload: payload.clone(),
                            };
                            match sender.try_send(message) {
                                Ok(()) => true,
                                Err(mpsc::error::TrySendError::Full(_)) => true,
                                Err(mpsc::error::TrySendError::Closed(_)) => false,
                            }
                        });
                    }
                }

                // The subscribe connection broke. Close every receiver so
                // subscribers learn of the break on their next recv, rather
                // than waiting on queued silence.
                warn!("Pub/sub connection closed, dropping all subscriptions");
                subs.lock().await.clear();
            })
        };

        info!(redis_url = %redis_url, "Connected Redis bus");

        Ok(Self {
            publisher,
            fanout: Script::new(FANOUT_SCRIPT),
            subs,
            sink: Mutex::new(sink),
            listener: Mutex::new(Some(listener)),
            closed: AtomicBool::new(false),
        })
    }

    fn check_open(&self) -> TransportResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

impl Bus for RedisBus {
    async fn publish(&self, channels: &[String], payload: Value) -> TransportResult<()> {
        self.check_open()?;
        if channels.is_empty() {
            return Ok(());
        }

        let raw = serde_json::to_string(&payload)?;

        let mut invocation = self.fanout.prepare_invoke();
        for channel in channels {
            invocation.key(channel.as_str());
        }
        invocation.arg(raw);

        let mut conn = self.publisher.clone();
        let fanned_out: i64 = invocation.invoke_async(&mut conn).await?;

        debug!(channels = fanned_out, "Published");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> TransportResult<mpsc::Receiver<BusMessage>> {
        self.check_open()?;

        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);

        let mut subs = self.subs.lock().await;
        let first_subscriber = !subs.contains_key(channel);
        subs.entry(channel.to_string()).or_default().push(tx);

        if first_subscriber {
            let mut sink = self.sink.lock().await;
            if let Err(e) = sink.subscribe(channel).await {
                subs.remove(channel);
                return Err(e.into());
            }
            debug!(channel = %channel, "SUBSCRIBE issued");
        }

        Ok(rx)
    }

    async fn unsubscribe(&self, channel: &str) -> TransportResult<()> {
        self.check_open()?;

        let mut subs = self.subs.lock().await;
        if subs.remove(channel).is_some() {
            let mut sink = self.sink.lock().await;
            sink.unsubscribe(channel).await?;
            debug!(channel = %channel, "UNSUBSCRIBE issued");
        }

        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Drain listeners before the connections go away so no callback
        // fires on a half-closed client.
        self.subs.lock().await.clear();

        if let Some(listener) = self.listener.lock().await.take() {
            listener.abort();
        }

        info!("Redis bus closed");
        Ok(())
    }
}
