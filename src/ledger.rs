//! Hash-chained, append-only ledger
//!
//! `LedgerStore` owns the chain tail. Appends are serialized through one
//! async mutex covering "read tail, seal record, durable write, advance
//! tail", so concurrent producers can never fork the chain. Readers never
//! take that lock: they bound their scan by the committed count, which is
//! only advanced after a write has fully landed.

use crate::backend::{LedgerBackend, MemoryBackend, StoredEntry};
use crate::error::{LedgerError, Result};
use crate::types::{now_millis, Payload, Record, GENESIS};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// Default number of newest records kept for replay
pub const DEFAULT_REPLAY_WINDOW: usize = 50;

/// Append-only, hash-chained record store
///
/// Cheap to clone; clones share the same chain.
#[derive(Clone)]
pub struct LedgerStore {
    inner: Arc<LedgerInner>,
}

struct LedgerInner {
    backend: Box<dyn LedgerBackend>,

    /// Newest committed record; guarded for the whole append critical section
    tail: Mutex<Option<Record>>,

    /// Entries fully written to the backend
    committed: AtomicUsize,

    /// Newest records, oldest first, at most `replay_window` long
    recent: RwLock<VecDeque<Record>>,

    replay_window: usize,
}

impl LedgerStore {
    /// Open a ledger over `backend`, recovering the tail from stored entries
    pub async fn open(backend: impl LedgerBackend + 'static, replay_window: usize) -> Result<Self> {
        let entries = backend.scan(None).await?;
        let malformed = entries
            .iter()
            .filter(|e| matches!(e, StoredEntry::Malformed { .. }))
            .count();
        if malformed > 0 {
            tracing::warn!(
                backend = backend.name(),
                malformed,
                "Ledger contains undecodable entries; run verification"
            );
        }

        let committed = entries.len();
        let records: Vec<Record> = entries
            .into_iter()
            .filter_map(|e| match e {
                StoredEntry::Record(r) => Some(r),
                StoredEntry::Malformed { .. } => None,
            })
            .collect();

        let replay_window = replay_window.max(1);
        let tail = records.last().cloned();
        let recent: VecDeque<Record> = records
            .into_iter()
            .rev()
            .take(replay_window)
            .rev()
            .collect();

        tracing::info!(
            backend = backend.name(),
            records = committed,
            tail = ?tail.as_ref().map(|r| &r.record_hash),
            "Ledger opened"
        );

        Ok(Self {
            inner: Arc::new(LedgerInner {
                backend: Box::new(backend),
                tail: Mutex::new(tail),
                committed: AtomicUsize::new(committed),
                recent: RwLock::new(recent),
                replay_window,
            }),
        })
    }

    /// Empty ledger over a fresh [`MemoryBackend`]
    pub fn in_memory(replay_window: usize) -> Self {
        Self {
            inner: Arc::new(LedgerInner {
                backend: Box::new(MemoryBackend::new()),
                tail: Mutex::new(None),
                committed: AtomicUsize::new(0),
                recent: RwLock::new(VecDeque::new()),
                replay_window: replay_window.max(1),
            }),
        }
    }

    /// Seal `payload` onto the chain and durably store it
    ///
    /// The critical section runs on its own task, so dropping the returned
    /// future never abandons a half-finished append.
    pub async fn append(&self, payload: Payload) -> Result<Record> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.append(payload).await })
            .await
            .map_err(|e| LedgerError::Append {
                reason: format!("append task failed: {}", e),
            })?
    }

    /// Every committed record, first to last
    ///
    /// Reflects the records committed when the call started; appends that
    /// land during the read are not included.
    pub async fn read_all(&self) -> Result<Vec<Record>> {
        self.snapshot()
            .await?
            .into_iter()
            .enumerate()
            .map(|(i, entry)| match entry {
                StoredEntry::Record(r) => Ok(r),
                StoredEntry::Malformed { reason } => Err(LedgerError::Malformed {
                    position: i + 1,
                    reason,
                }),
            })
            .collect()
    }

    /// Raw stored entries bounded by the committed count
    pub(crate) async fn snapshot(&self) -> Result<Vec<StoredEntry>> {
        let bound = self.len();
        self.inner.backend.scan(Some(bound)).await
    }

    /// The most recently appended record
    pub fn tail(&self) -> Option<Record> {
        self.read_recent(|recent| recent.back().cloned())
    }

    /// Up to `limit` newest records, oldest first, capped by the replay window
    pub fn recent(&self, limit: usize) -> Vec<Record> {
        self.read_recent(|recent| {
            let skip = recent.len().saturating_sub(limit);
            recent.iter().skip(skip).cloned().collect()
        })
    }

    /// Committed entry count
    pub fn len(&self) -> usize {
        self.inner.committed.load(Ordering::Acquire)
    }

    /// Whether nothing has been committed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replay window size
    pub fn replay_window(&self) -> usize {
        self.inner.replay_window
    }

    /// Backend name
    pub fn backend_name(&self) -> &str {
        self.inner.backend.name()
    }

    fn read_recent<T>(&self, f: impl FnOnce(&VecDeque<Record>) -> T) -> T {
        let recent = self.inner.recent.read().unwrap_or_else(|e| e.into_inner());
        f(&recent)
    }
}

impl LedgerInner {
    async fn append(&self, payload: Payload) -> Result<Record> {
        let mut tail = self.tail.lock().await;

        let (prev_hash, floor) = match tail.as_ref() {
            Some(t) => (t.record_hash.clone(), t.sequence_time),
            None => (GENESIS.to_string(), 0),
        };
        // Never let a clock step backwards reorder timestamps along the chain
        let record = Record::seal(now_millis().max(floor), prev_hash, payload);

        if let Err(e) = self.backend.append(&record).await {
            tracing::error!(
                backend = self.backend.name(),
                error = %e,
                "Ledger append failed"
            );
            return Err(e);
        }

        let position = self.committed.fetch_add(1, Ordering::AcqRel) + 1;
        {
            let mut recent = self.recent.write().unwrap_or_else(|e| e.into_inner());
            recent.push_back(record.clone());
            while recent.len() > self.replay_window {
                recent.pop_front();
            }
        }
        *tail = Some(record.clone());

        tracing::debug!(
            position,
            record_hash = %record.record_hash,
            prev_hash = %record.prev_hash,
            "Record appended"
        );

        Ok(record)
    }
}
