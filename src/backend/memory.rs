//! In-memory backend for testing and single-process use
//!
//! Holds encoded lines rather than `Record` values so reads go through
//! the same decode path as the file backend.

use super::{decode_line, encode_line, LedgerBackend, StoredEntry};
use crate::error::{LedgerError, Result};
use crate::types::Record;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// In-memory ledger medium
///
/// Cloning yields another handle to the same lines.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    lines: Arc<RwLock<Vec<String>>>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored lines
    pub fn len(&self) -> usize {
        self.lines.read().map(|l| l.len()).unwrap_or(0)
    }

    /// Whether nothing has been stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the stored lines
    pub fn lines(&self) -> Vec<String> {
        self.lines.read().map(|l| l.clone()).unwrap_or_default()
    }

    /// Replace a stored line in place, bypassing the ledger
    #[cfg(test)]
    pub(crate) fn overwrite(&self, index: usize, line: String) {
        if let Ok(mut lines) = self.lines.write() {
            lines[index] = line;
        }
    }
}

#[async_trait]
impl LedgerBackend for MemoryBackend {
    async fn append(&self, record: &Record) -> Result<()> {
        let line = encode_line(record)?;
        let mut lines = self.lines.write().map_err(|e| LedgerError::Append {
            reason: format!("Failed to acquire ledger lock: {}", e),
        })?;
        lines.push(line.trim_end().to_string());
        Ok(())
    }

    async fn scan(&self, limit: Option<usize>) -> Result<Vec<StoredEntry>> {
        let lines = self.lines.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire ledger lock: {}", e))
        })?;
        let take = limit.unwrap_or(lines.len());
        Ok(lines
            .iter()
            .take(take)
            .map(|l| decode_line(l.as_bytes()))
            .collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
