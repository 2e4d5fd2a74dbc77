//! Ring buffer of recent high-level actions per channel.
//!
//! Clients poll with the last sequence number they saw and get back the
//! actions since, deciding themselves whether to re-fetch. Payloads are
//! never pushed through here.

use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

/// Actions retained per channel; the oldest fall off first.
pub const ACTION_BUFFER_CAPACITY: usize = 100;

/// One recorded action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggeredAction {
    /// Monotonic per-channel sequence.
    pub seq: u64,
    /// Action name, e.g. `addRecord`, `deleteRecord`, `applyViewFilter`.
    pub action: String,
}

struct ChannelBuffer {
    next_seq: u64,
    actions: VecDeque<TriggeredAction>,
}

/// Per-channel action ring buffers.
pub struct ActionTriggerBuffer {
    inner: Mutex<HashMap<String, ChannelBuffer>>,
}

impl ActionTriggerBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Record an action, returning its sequence number.
    pub async fn push(&self, channel: &str, action: &str) -> u64 {
        let mut inner = self.inner.lock().await;
        let buffer = inner
            .entry(channel.to_string())
            .or_insert_with(|| ChannelBuffer {
                next_seq: 1,
                actions: VecDeque::new(),
            });

        let seq = buffer.next_seq;
        buffer.next_seq += 1;
        buffer.actions.push_back(TriggeredAction {
            seq,
            action: action.to_string(),
        });
        if buffer.actions.len() > ACTION_BUFFER_CAPACITY {
            buffer.actions.pop_front();
        }

        seq
    }

    /// Actions recorded after `after_seq`, oldest first.
    pub async fn since(&self, channel: &str, after_seq: u64) -> Vec<TriggeredAction> {
        let inner = self.inner.lock().await;
        inner
            .get(channel)
            .map(|buffer| {
                buffer
                    .actions
                    .iter()
                    .filter(|a| a.seq > after_seq)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Latest sequence number recorded for a channel.
    pub async fn latest_seq(&self, channel: &str) -> u64 {
        let inner = self.inner.lock().await;
        inner
            .get(channel)
            .map(|buffer| buffer.next_seq - 1)
            .unwrap_or(0)
    }
}

impl Default for ActionTriggerBuffer {
    fn default() -> Self {
        Self::new()
    }
}
