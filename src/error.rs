//! Error types for a3s-ledger

use thiserror::Error;

/// Errors that can occur in the ledger and alert bus
///
/// Chain corruption is deliberately absent: it is reported as a
/// [`ChainVerification`](crate::verify::ChainVerification) value, never
/// raised from normal reads or appends.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Durable write did not complete; nothing was committed or broadcast
    #[error("Failed to append record: {reason}")]
    Append { reason: String },

    /// Reading the durable medium failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// A stored line could not be decoded (1-based position)
    #[error("Malformed record at position {position}: {reason}")]
    Malformed { position: usize, reason: String },

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Raw I/O failure outside the append path
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;
