//! # a3s-ledger
//!
//! Tamper-evident event ledger with live alert distribution for the A3S
//! safety-monitoring backend.
//!
//! ## Overview
//!
//! Every significant event (enrolment, geofence breach, route deviation,
//! panic) is sealed onto an append-only hash chain and then pushed to all
//! live observers. Any later rewrite of stored records is detectable by
//! replaying the chain.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_ledger::{Alert, AlertBus, AlertKind};
//!
//! # async fn example() -> a3s_ledger::Result<()> {
//! let bus = AlertBus::in_memory();
//! let mut dashboard = bus.attach();
//!
//! let record = bus
//!     .publish(Alert::new(AlertKind::Panic, "T1").with_location(26.15, 91.75))
//!     .await?;
//!
//! let live = dashboard.next().await;
//! assert_eq!(live.map(|r| r.record_hash.clone()), Some(record.record_hash));
//! assert!(bus.verify().await?.valid);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **LedgerStore** — append-only chain; serializes appends, caches the tail
//! - **LedgerBackend** trait — durable medium (JSONL file, in-memory)
//! - **ChainVerifier** — read-only full-chain replay
//! - **AlertBus** — append, then non-blocking fan-out
//! - **SubscriberRegistry** — bounded per-subscriber channels, drop on overflow

pub mod backend;
pub mod bus;
pub mod canonical;
pub mod config;
pub mod error;
pub mod ledger;
pub mod registry;
pub mod types;
pub mod verify;

// Re-export core types
pub use backend::{FileBackend, LedgerBackend, MemoryBackend, StoredEntry};
pub use bus::AlertBus;
pub use config::LedgerConfig;
pub use error::{LedgerError, Result};
pub use ledger::{LedgerStore, DEFAULT_REPLAY_WINDOW};
pub use registry::{AlertSubscription, Delivery, SubscriberRegistry, DEFAULT_SUBSCRIBER_BUFFER};
pub use types::{payload_from, Alert, AlertKind, LedgerInfo, Location, Payload, Record, GENESIS};
pub use verify::{ChainIssue, ChainVerification, ChainVerifier};
