//! Full-chain verification
//!
//! Replays stored entries from the first, recomputing every record hash
//! with the same canonical encoding used at append time and checking each
//! `prev_hash` link. Verification is read-only; a broken chain is a
//! result, not an error, and the ledger keeps accepting appends.

use crate::backend::StoredEntry;
use crate::error::Result;
use crate::ledger::LedgerStore;
use crate::types::{Record, GENESIS};
use serde::Serialize;

/// First problem found while replaying the chain (1-based positions)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainIssue {
    /// Stored `record_hash` does not match the recomputed digest
    HashMismatch {
        position: usize,
        expected: String,
        found: String,
    },
    /// `prev_hash` does not match the preceding record's hash
    LinkMismatch {
        position: usize,
        expected: String,
        found: String,
    },
    /// Entry could not be decoded as a record
    Malformed { position: usize, reason: String },
    /// Fewer entries stored than were committed
    Truncated { committed: usize, found: usize },
}

impl ChainIssue {
    /// Position of the first broken record
    pub fn position(&self) -> usize {
        match self {
            Self::HashMismatch { position, .. }
            | Self::LinkMismatch { position, .. }
            | Self::Malformed { position, .. } => *position,
            Self::Truncated { found, .. } => found + 1,
        }
    }
}

/// Outcome of a verification pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainVerification {
    /// Whether the whole chain is intact
    pub valid: bool,
    /// Entries inspected
    pub checked: usize,
    /// Position of the first broken record, if any
    pub first_invalid: Option<usize>,
    /// What was wrong there
    pub issue: Option<ChainIssue>,
}

impl ChainVerification {
    fn intact(checked: usize) -> Self {
        Self {
            valid: true,
            checked,
            first_invalid: None,
            issue: None,
        }
    }

    fn broken(checked: usize, issue: ChainIssue) -> Self {
        Self {
            valid: false,
            checked,
            first_invalid: Some(issue.position()),
            issue: Some(issue),
        }
    }
}

/// Stateless chain verifier
pub struct ChainVerifier;

impl ChainVerifier {
    /// Verify every record committed when the call starts
    ///
    /// Safe to run alongside appends: the scan is bounded by the committed
    /// count at entry, so records landing later are not inspected.
    pub async fn verify(store: &LedgerStore) -> Result<ChainVerification> {
        let committed = store.len();
        let entries = store.snapshot().await?;

        let mut result = Self::verify_entries(&entries);
        if result.valid && entries.len() < committed {
            result = ChainVerification::broken(
                entries.len(),
                ChainIssue::Truncated {
                    committed,
                    found: entries.len(),
                },
            );
        }

        if let Some(issue) = &result.issue {
            tracing::warn!(
                position = issue.position(),
                issue = ?issue,
                "Ledger chain verification failed"
            );
        } else {
            tracing::debug!(checked = result.checked, "Ledger chain verified");
        }

        Ok(result)
    }

    /// Verify raw stored entries in order
    pub fn verify_entries(entries: &[StoredEntry]) -> ChainVerification {
        let mut expected_prev = GENESIS.to_string();

        for (i, entry) in entries.iter().enumerate() {
            let position = i + 1;
            let record = match entry {
                StoredEntry::Record(r) => r,
                StoredEntry::Malformed { reason } => {
                    return ChainVerification::broken(
                        position,
                        ChainIssue::Malformed {
                            position,
                            reason: reason.clone(),
                        },
                    );
                }
            };

            if let Some(issue) = check_record(position, record, &expected_prev) {
                return ChainVerification::broken(position, issue);
            }
            expected_prev.clone_from(&record.record_hash);
        }

        ChainVerification::intact(entries.len())
    }

    /// Verify already-decoded records in order
    pub fn verify_records(records: &[Record]) -> ChainVerification {
        let mut expected_prev = GENESIS;

        for (i, record) in records.iter().enumerate() {
            let position = i + 1;
            if let Some(issue) = check_record(position, record, expected_prev) {
                return ChainVerification::broken(position, issue);
            }
            expected_prev = record.record_hash.as_str();
        }

        ChainVerification::intact(records.len())
    }
}

fn check_record(position: usize, record: &Record, expected_prev: &str) -> Option<ChainIssue> {
    let recomputed = record.recompute_hash();
    if recomputed != record.record_hash {
        return Some(ChainIssue::HashMismatch {
            position,
            expected: recomputed,
            found: record.record_hash.clone(),
        });
    }
    if record.prev_hash != expected_prev {
        return Some(ChainIssue::LinkMismatch {
            position,
            expected: expected_prev.to_string(),
            found: record.prev_hash.clone(),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::types::payload_from;
    use serde_json::{json, Value};

    async fn ledger_with(backend: &MemoryBackend, n: usize) -> LedgerStore {
        let ledger = LedgerStore::open(backend.clone(), 10).await.unwrap();
        for i in 0..n {
            ledger
                .append(payload_from(json!({"event": "PANIC", "n": i})))
                .await
                .unwrap();
        }
        ledger
    }

    fn tamper(backend: &MemoryBackend, index: usize, f: impl FnOnce(&mut Value)) {
        let mut value: Value = serde_json::from_str(&backend.lines()[index]).unwrap();
        f(&mut value);
        backend.overwrite(index, value.to_string());
    }

    #[tokio::test]
    async fn test_empty_chain_is_valid() {
        let ledger = LedgerStore::in_memory(10);
        let result = ChainVerifier::verify(&ledger).await.unwrap();
        assert!(result.valid);
        assert_eq!(result.checked, 0);
        assert!(result.first_invalid.is_none());
    }

    #[tokio::test]
    async fn test_intact_chain_stays_valid() {
        let backend = MemoryBackend::new();
        let ledger = ledger_with(&backend, 6).await;

        for _ in 0..3 {
            let result = ChainVerifier::verify(&ledger).await.unwrap();
            assert!(result.valid);
            assert_eq!(result.checked, 6);
        }
        ledger.read_all().await.unwrap();
        assert!(ChainVerifier::verify(&ledger).await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_each_field_tamper_detected_at_position() {
        let fields: [(&str, Value); 4] = [
            ("payload", json!({"event": "SAFE"})),
            ("prev_hash", json!("0".repeat(64))),
            ("record_hash", json!("f".repeat(64))),
            ("sequence_time", json!(1)),
        ];

        for (field, replacement) in fields {
            let backend = MemoryBackend::new();
            let ledger = ledger_with(&backend, 5).await;
            tamper(&backend, 2, |v| v[field] = replacement.clone());

            let result = ChainVerifier::verify(&ledger).await.unwrap();
            assert!(!result.valid, "tampering {} went unnoticed", field);
            assert_eq!(result.first_invalid, Some(3), "field {}", field);
            assert!(matches!(
                result.issue,
                Some(ChainIssue::HashMismatch { position: 3, .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_rehashed_record_breaks_next_link() {
        let backend = MemoryBackend::new();
        let ledger = ledger_with(&backend, 3).await;

        // Rewrite record 1 consistently with itself; record 2 still points at the old hash
        let mut records = ledger.read_all().await.unwrap();
        let forged = Record::seal(
            records[0].sequence_time,
            GENESIS.to_string(),
            payload_from(json!({"event": "SAFE"})),
        );
        records[0] = forged.clone();
        backend.overwrite(0, serde_json::to_string(&forged).unwrap());

        let result = ChainVerifier::verify(&ledger).await.unwrap();
        assert_eq!(result.first_invalid, Some(2));
        assert!(matches!(
            result.issue,
            Some(ChainIssue::LinkMismatch { position: 2, .. })
        ));
        assert_eq!(ChainVerifier::verify_records(&records).first_invalid, Some(2));
    }

    #[tokio::test]
    async fn test_malformed_entry() {
        let backend = MemoryBackend::new();
        let ledger = ledger_with(&backend, 3).await;
        backend.overwrite(1, "{\"truncated".to_string());

        let result = ChainVerifier::verify(&ledger).await.unwrap();
        assert_eq!(result.first_invalid, Some(2));
        assert!(matches!(
            result.issue,
            Some(ChainIssue::Malformed { position: 2, .. })
        ));
    }

    #[test]
    fn test_reordered_records() {
        let a = Record::seal(1, GENESIS.to_string(), payload_from(json!({"n": 1})));
        let b = Record::seal(2, a.record_hash.clone(), payload_from(json!({"n": 2})));
        let c = Record::seal(3, b.record_hash.clone(), payload_from(json!({"n": 3})));

        assert!(ChainVerifier::verify_records(&[a.clone(), b.clone(), c.clone()]).valid);

        let result = ChainVerifier::verify_records(&[a, c, b]);
        assert_eq!(result.first_invalid, Some(2));
        assert_eq!(result.checked, 2);
    }

    #[test]
    fn test_chain_not_starting_at_genesis() {
        let a = Record::seal(1, GENESIS.to_string(), payload_from(json!({"n": 1})));
        let b = Record::seal(2, a.record_hash.clone(), payload_from(json!({"n": 2})));

        let result = ChainVerifier::verify_entries(&[StoredEntry::Record(b)]);
        assert!(matches!(
            result.issue,
            Some(ChainIssue::LinkMismatch { position: 1, .. })
        ));
    }

    #[test]
    fn test_issue_serialization() {
        let issue = ChainIssue::Truncated {
            committed: 4,
            found: 2,
        };
        assert_eq!(issue.position(), 3);
        let json = serde_json::to_string(&issue).unwrap();
        assert!(json.contains("\"kind\":\"truncated\""));
    }
}
