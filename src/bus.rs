//! Alert distribution bus
//!
//! `AlertBus` records every event through the [`LedgerStore`] and only
//! then fans the committed record out to live subscribers. A failed
//! append is returned to the caller and nothing is broadcast.

use crate::backend::FileBackend;
use crate::config::LedgerConfig;
use crate::error::Result;
use crate::ledger::{LedgerStore, DEFAULT_REPLAY_WINDOW};
use crate::registry::{AlertSubscription, SubscriberRegistry, DEFAULT_SUBSCRIBER_BUFFER};
use crate::types::{LedgerInfo, Payload, Record};
use crate::verify::{ChainVerification, ChainVerifier};
use std::sync::Arc;

/// Ledger-backed publish/subscribe bus
///
/// Cheap to clone; clones share the ledger and the subscriber set.
#[derive(Clone)]
pub struct AlertBus {
    ledger: LedgerStore,
    registry: Arc<SubscriberRegistry>,
}

impl AlertBus {
    /// Create a bus over an opened ledger
    pub fn new(ledger: LedgerStore, subscriber_buffer: usize) -> Self {
        Self {
            ledger,
            registry: Arc::new(SubscriberRegistry::new(subscriber_buffer)),
        }
    }

    /// Bus over an empty in-memory ledger with default limits
    pub fn in_memory() -> Self {
        Self::new(
            LedgerStore::in_memory(DEFAULT_REPLAY_WINDOW),
            DEFAULT_SUBSCRIBER_BUFFER,
        )
    }

    /// Open a file-backed bus from configuration
    pub async fn open(config: &LedgerConfig) -> Result<Self> {
        config.validate()?;
        let backend = FileBackend::open(&config.path, config.sync_writes).await?;
        let ledger = LedgerStore::open(backend, config.replay_window).await?;
        Ok(Self::new(ledger, config.subscriber_buffer))
    }

    /// Record an event and broadcast the committed record
    pub async fn publish(&self, payload: impl Into<Payload>) -> Result<Record> {
        let record = self.ledger.append(payload.into()).await?;

        let delivery = self.registry.broadcast(&Arc::new(record.clone()));
        tracing::debug!(
            record_hash = %record.record_hash,
            delivered = delivery.delivered,
            dropped = delivery.dropped,
            "Record published"
        );

        Ok(record)
    }

    /// Record an event without broadcasting it
    pub async fn append(&self, payload: impl Into<Payload>) -> Result<Record> {
        self.ledger.append(payload.into()).await
    }

    /// Up to `limit` newest records, oldest first, capped by the replay window
    pub fn recent_alerts(&self, limit: usize) -> Vec<Record> {
        self.ledger.recent(limit)
    }

    /// Attach a subscriber, replaying the full replay window as backlog
    pub fn attach(&self) -> AlertSubscription {
        let ledger = self.ledger.clone();
        self.registry
            .attach_with(move || ledger.recent(ledger.replay_window()))
    }

    /// Detach a subscriber; returns whether it was still attached
    pub fn detach(&self, subscription: AlertSubscription) -> bool {
        self.registry.detach(subscription.id())
    }

    /// Every committed record, first to last
    pub async fn read_all(&self) -> Result<Vec<Record>> {
        self.ledger.read_all().await
    }

    /// Replay and check the whole chain
    pub async fn verify(&self) -> Result<ChainVerification> {
        ChainVerifier::verify(&self.ledger).await
    }

    /// Current ledger and subscriber status
    pub fn info(&self) -> LedgerInfo {
        LedgerInfo {
            records: self.ledger.len(),
            subscribers: self.registry.len(),
            tail_hash: self.ledger.tail().map(|r| r.record_hash),
        }
    }

    /// The underlying ledger
    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    /// The subscriber registry
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }
}
