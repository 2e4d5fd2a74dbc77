//! Consumer-side arrival tracking.

use crate::{TransactionMeta, TxnError, TxnResult};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

/// How many completed transaction keys are remembered so a late extra op is
/// rejected instead of opening a fresh count.
const COMPLETED_KEY_MEMORY: usize = 1024;

/// Arrival progress for one transaction key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Ops observed so far.
    pub seen: u32,
    /// Ops the command declared.
    pub expected: u32,
}

impl Progress {
    /// True once every declared op has been observed.
    pub fn is_complete(&self) -> bool {
        self.seen >= self.expected
    }
}

struct TxnState {
    seen: u32,
    expected: u32,
    notify: Arc<Notify>,
}

/// Counts op arrivals per transaction key.
///
/// The tracker imposes no timeout of its own; callers pass their deadline to
/// [`TransactionTracker::wait_complete`] and treat non-completion as a
/// reportable partial failure. Nothing is retried or rolled back here.
pub struct TransactionTracker {
    inner: Mutex<TrackerInner>,
}

struct TrackerInner {
    active: HashMap<String, TxnState>,
    /// Recently completed keys, oldest first.
    completed: VecDeque<String>,
}

impl TransactionTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TrackerInner {
                active: HashMap::new(),
                completed: VecDeque::new(),
            }),
        }
    }

    /// Record one op arrival for `meta`'s key.
    ///
    /// Returns the progress after this arrival. Observing an op for a key
    /// that already completed, or beyond its declared count, is an error.
    pub async fn observe(&self, meta: &TransactionMeta) -> TxnResult<Progress> {
        if meta.op_count == 0 {
            return Err(TxnError::EmptyTransaction);
        }

        let mut inner = self.inner.lock().await;

        if inner.completed.contains(&meta.transaction_key) {
            warn!(
                key = %meta.transaction_key,
                expected = meta.op_count,
                "Extra op observed for completed transaction"
            );
            return Err(TxnError::TooManyOps {
                key: meta.transaction_key.clone(),
                expected: meta.op_count,
            });
        }

        let state = inner
            .active
            .entry(meta.transaction_key.clone())
            .or_insert_with(|| TxnState {
                seen: 0,
                expected: meta.op_count,
                notify: Arc::new(Notify::new()),
            });

        if state.expected != meta.op_count {
            return Err(TxnError::OpCountMismatch {
                key: meta.transaction_key.clone(),
                first: state.expected,
                second: meta.op_count,
            });
        }

        state.seen += 1;
        let progress = Progress {
            seen: state.seen,
            expected: state.expected,
        };

        debug!(
            key = %meta.transaction_key,
            seen = progress.seen,
            expected = progress.expected,
            "Observed transaction op"
        );

        if progress.is_complete() {
            state.notify.notify_waiters();
            inner.active.remove(&meta.transaction_key);
            inner.completed.push_back(meta.transaction_key.clone());
            if inner.completed.len() > COMPLETED_KEY_MEMORY {
                inner.completed.pop_front();
            }
        }

        Ok(progress)
    }

    /// Current progress for a key, if it is still being tracked.
    pub async fn progress(&self, key: &str) -> Option<Progress> {
        let inner = self.inner.lock().await;
        inner.active.get(key).map(|s| Progress {
            seen: s.seen,
            expected: s.expected,
        })
    }

    /// Wait until every op of `meta`'s transaction has been observed.
    ///
    /// Fails with [`TxnError::PartialTransaction`] if the deadline elapses
    /// first; the partial state stays tracked so the caller can reconcile.
    pub async fn wait_complete(
        &self,
        meta: &TransactionMeta,
        deadline: Duration,
    ) -> TxnResult<()> {
        let wait = async {
            loop {
                let notify = {
                    let inner = self.inner.lock().await;
                    if inner.completed.contains(&meta.transaction_key) {
                        return;
                    }
                    match inner.active.get(&meta.transaction_key) {
                        Some(state) if state.seen >= state.expected => return,
                        Some(state) => Some(state.notify.clone()),
                        // No op observed yet: the key is not registered
                        // until the first arrival.
                        None => None,
                    }
                };
                match notify {
                    // Bounded wait: a completion firing between the lock
                    // release and this await would otherwise be missed.
                    Some(notify) => {
                        let _ = tokio::time::timeout(
                            Duration::from_millis(50),
                            notify.notified(),
                        )
                        .await;
                    }
                    None => tokio::time::sleep(Duration::from_millis(5)).await,
                }
            }
        };

        match tokio::time::timeout(deadline, wait).await {
            Ok(()) => Ok(()),
            Err(_) => {
                let inner = self.inner.lock().await;
                let seen = inner
                    .active
                    .get(&meta.transaction_key)
                    .map(|s| s.seen)
                    .unwrap_or(0);
                Err(TxnError::PartialTransaction {
                    key: meta.transaction_key.clone(),
                    seen,
                    expected: meta.op_count,
                })
            }
        }
    }
}

impl Default for TransactionTracker {
    fn default() -> Self {
        Self::new()
    }
}
