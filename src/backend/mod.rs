//! Durable medium behind the ledger
//!
//! A backend stores one self-contained record per entry, strictly in
//! append order, and never rewrites what it already holds. The
//! [`LedgerStore`](crate::ledger::LedgerStore) serializes all appends,
//! so backends only need to be safe for one writer and many readers.

use crate::error::Result;
use crate::types::Record;
use async_trait::async_trait;

pub mod file;
pub mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Core trait for ledger storage media
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Durably append one record
    ///
    /// On error the medium must be left as it was before the call.
    async fn append(&self, record: &Record) -> Result<()>;

    /// Read stored entries in order, stopping after `limit` entries
    ///
    /// Entries that cannot be decoded are returned as
    /// [`StoredEntry::Malformed`] so callers can locate them.
    async fn scan(&self, limit: Option<usize>) -> Result<Vec<StoredEntry>>;

    /// Backend name (e.g., "file", "memory")
    fn name(&self) -> &str;
}

/// One stored entry as read back from the medium
#[derive(Debug, Clone)]
pub enum StoredEntry {
    /// A decodable record
    Record(Record),
    /// Bytes that do not decode as a record
    Malformed { reason: String },
}

impl StoredEntry {
    /// The decoded record, if any
    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            Self::Malformed { .. } => None,
        }
    }
}

/// Encode a record as one newline-terminated JSON line
pub(crate) fn encode_line(record: &Record) -> Result<String> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    Ok(line)
}

/// Decode one stored line
pub(crate) fn decode_line(bytes: &[u8]) -> StoredEntry {
    match serde_json::from_slice::<Record>(bytes) {
        Ok(record) => StoredEntry::Record(record),
        Err(e) => StoredEntry::Malformed {
            reason: e.to_string(),
        },
    }
}

/// Whether a raw line carries no data
pub(crate) fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| b.is_ascii_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Payload, GENESIS};

    #[test]
    fn test_encode_decode_line() {
        let record = Record::seal(7, GENESIS.to_string(), Payload::new());
        let line = encode_line(&record).unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let entry = decode_line(line.trim_end().as_bytes());
        assert_eq!(entry.record(), Some(&record));
    }

    #[test]
    fn test_decode_garbage() {
        let entry = decode_line(b"{not json");
        assert!(matches!(entry, StoredEntry::Malformed { .. }));
        assert!(entry.record().is_none());
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(b""));
        assert!(is_blank(b"  \r"));
        assert!(!is_blank(b"{}"));
    }
}
