//! Live subscriber tracking
//!
//! Each subscriber owns a bounded channel. Fan-out snapshots the sender
//! set and then delivers with `try_send` outside the lock, so attach and
//! detach never contend with an in-flight broadcast and a slow consumer
//! can never stall a publisher. A subscriber whose buffer is full or whose
//! receiver is gone is removed on the spot.

use crate::types::Record;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// Default per-subscriber buffer capacity
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Subscribers that accepted the record
    pub delivered: usize,
    /// Subscribers removed because delivery failed
    pub dropped: usize,
}

/// Set of currently attached subscribers
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<String, mpsc::Sender<Arc<Record>>>>,
    buffer: usize,
}

impl SubscriberRegistry {
    /// Create a registry with a fixed per-subscriber buffer
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Attach a subscriber with no backlog
    pub fn attach(self: &Arc<Self>) -> AlertSubscription {
        self.attach_with(Vec::new)
    }

    /// Attach a subscriber, then load its backlog
    ///
    /// Registration happens first so nothing published in between is
    /// missed; live records already present in the backlog are skipped
    /// by the subscription.
    pub fn attach_with(self: &Arc<Self>, backlog: impl FnOnce() -> Vec<Record>) -> AlertSubscription {
        let id = format!("sub-{}", uuid::Uuid::new_v4());
        let (tx, rx) = mpsc::channel(self.buffer);
        self.write().insert(id.clone(), tx);

        let backlog = backlog();
        let seen = backlog.iter().map(|r| r.record_hash.clone()).collect();

        tracing::info!(
            subscriber = %id,
            backlog = backlog.len(),
            subscribers = self.len(),
            "Subscriber attached"
        );

        AlertSubscription {
            id,
            backlog,
            seen,
            rx,
            registry: Arc::downgrade(self),
        }
    }

    /// Remove a subscriber; returns whether it was attached
    pub fn detach(&self, id: &str) -> bool {
        let removed = self.write().remove(id).is_some();
        if removed {
            tracing::info!(subscriber = %id, "Subscriber detached");
        }
        removed
    }

    /// Deliver `record` to every attached subscriber without waiting
    pub fn broadcast(&self, record: &Arc<Record>) -> Delivery {
        let targets: Vec<(String, mpsc::Sender<Arc<Record>>)> = self
            .read()
            .iter()
            .map(|(id, tx)| (id.clone(), tx.clone()))
            .collect();

        let mut delivery = Delivery::default();
        let mut failed = Vec::new();
        for (id, tx) in targets {
            match tx.try_send(Arc::clone(record)) {
                Ok(()) => delivery.delivered += 1,
                Err(TrySendError::Full(_)) => failed.push((id, "buffer full")),
                Err(TrySendError::Closed(_)) => failed.push((id, "closed")),
            }
        }

        if !failed.is_empty() {
            let mut subs = self.write();
            for (id, reason) in failed {
                if subs.remove(&id).is_some() {
                    delivery.dropped += 1;
                    tracing::warn!(subscriber = %id, reason, "Subscriber dropped");
                }
            }
        }

        delivery
    }

    /// Number of attached subscribers
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no subscriber is attached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` is currently attached
    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, mpsc::Sender<Arc<Record>>>> {
        self.subscribers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, mpsc::Sender<Arc<Record>>>> {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

/// Handle to a live record stream
///
/// Dropping the handle detaches it.
pub struct AlertSubscription {
    id: String,
    backlog: Vec<Record>,
    /// Backlog hashes not yet seen on the live channel
    seen: HashSet<String>,
    rx: mpsc::Receiver<Arc<Record>>,
    registry: Weak<SubscriberRegistry>,
}

impl AlertSubscription {
    /// Subscriber identifier (sub-<uuid>)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Records replayed at attach time, oldest first
    pub fn backlog(&self) -> &[Record] {
        &self.backlog
    }

    /// Next live record; `None` once detached and drained
    pub async fn next(&mut self) -> Option<Arc<Record>> {
        loop {
            let record = self.rx.recv().await?;
            if !self.seen.remove(&record.record_hash) {
                return Some(record);
            }
        }
    }

    /// Next live record if one is already buffered
    pub fn try_next(&mut self) -> Option<Arc<Record>> {
        loop {
            match self.rx.try_recv() {
                Ok(record) if self.seen.remove(&record.record_hash) => continue,
                Ok(record) => return Some(record),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return None,
            }
        }
    }

    /// Whether the registry still holds this subscriber
    pub fn is_attached(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.contains(&self.id))
    }

    /// Adapt into a `Stream` of live records
    pub fn into_stream(self) -> impl futures::Stream<Item = Arc<Record>> + Send {
        futures::stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|record| (record, sub))
        })
    }
}

impl Drop for AlertSubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.detach(&self.id);
        }
    }
}
