//! JSON Lines file backend
//!
//! Layout: one record per line, `{"sequence_time":..,"prev_hash":..,"payload":{..},"record_hash":".."}`.
//! One append handle is kept open and tracks the committed length; a
//! failed write is rolled back by truncating to that length. A file that
//! ends in a torn line gets a separator before the next record so the
//! fragment stays on its own line.

use super::{decode_line, encode_line, is_blank, LedgerBackend, StoredEntry};
use crate::error::{LedgerError, Result};
use crate::types::Record;
use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

/// Append-only JSONL file
pub struct FileBackend {
    path: PathBuf,
    sync_writes: bool,
    writer: Mutex<Option<AppendHandle>>,
}

/// Open append handle with the file length it has committed
struct AppendHandle {
    file: File,
    len: u64,
    /// Last byte on disk is not a newline (torn write)
    needs_separator: bool,
}

impl FileBackend {
    /// Open (or prepare) a ledger file, creating parent directories
    pub async fn open(path: impl Into<PathBuf>, sync_writes: bool) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        tracing::debug!(path = %path.display(), sync_writes, "File backend ready");
        Ok(Self {
            path,
            sync_writes,
            writer: Mutex::new(None),
        })
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open_handle(&self) -> std::io::Result<AppendHandle> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await?;
        let len = file.metadata().await?.len();

        let mut needs_separator = false;
        if len > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1)).await?;
            file.read_exact(&mut last).await?;
            needs_separator = last[0] != b'\n';
        }
        if needs_separator {
            tracing::warn!(
                path = %self.path.display(),
                len,
                "Ledger ends in a torn line; next record starts on a new line"
            );
        }

        Ok(AppendHandle {
            file,
            len,
            needs_separator,
        })
    }
}

/// Writable medium that can be cut back to a previous length
#[async_trait]
trait Medium: Send {
    async fn write_line(&mut self, bytes: &[u8], sync: bool) -> std::io::Result<()>;
    async fn truncate(&mut self, len: u64) -> std::io::Result<()>;
}

#[async_trait]
impl Medium for File {
    async fn write_line(&mut self, bytes: &[u8], sync: bool) -> std::io::Result<()> {
        self.write_all(bytes).await?;
        self.flush().await?;
        if sync {
            self.sync_data().await?;
        }
        Ok(())
    }

    async fn truncate(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len).await
    }
}

/// Write `bytes` at `len`, cutting the medium back to `len` on failure
///
/// Returns the new length. `Err((e, false))` means the rollback also
/// failed and the tail of the medium is unknown.
async fn write_or_rollback<M: Medium>(
    medium: &mut M,
    len: u64,
    bytes: &[u8],
    sync: bool,
) -> std::result::Result<u64, (std::io::Error, bool)> {
    match medium.write_line(bytes, sync).await {
        Ok(()) => Ok(len + bytes.len() as u64),
        Err(e) => match medium.truncate(len).await {
            Ok(()) => Err((e, true)),
            Err(truncate_err) => {
                tracing::error!(error = %truncate_err, "Failed to roll back partial ledger write");
                Err((e, false))
            }
        },
    }
}

#[async_trait]
impl LedgerBackend for FileBackend {
    async fn append(&self, record: &Record) -> Result<()> {
        let line = encode_line(record)?;
        let append_err = |e: std::io::Error| LedgerError::Append {
            reason: format!("{}: {}", self.path.display(), e),
        };

        let mut writer = self.writer.lock().await;
        let mut handle = match writer.take() {
            Some(handle) => handle,
            None => self.open_handle().await.map_err(append_err)?,
        };

        let mut bytes = Vec::with_capacity(line.len() + 1);
        if handle.needs_separator {
            bytes.push(b'\n');
        }
        bytes.extend_from_slice(line.as_bytes());

        match write_or_rollback(&mut handle.file, handle.len, &bytes, self.sync_writes).await {
            Ok(len) => {
                handle.len = len;
                handle.needs_separator = false;
                *writer = Some(handle);
                Ok(())
            }
            Err((e, rolled_back)) => {
                // Without a rollback the tail is re-probed on the next append
                if rolled_back {
                    *writer = Some(handle);
                }
                Err(append_err(e))
            }
        }
    }

    async fn scan(&self, limit: Option<usize>) -> Result<Vec<StoredEntry>> {
        let file = match File::open(&self.path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(LedgerError::Storage(format!(
                    "Failed to open ledger {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let mut segments = BufReader::new(file).split(b'\n');
        let mut entries = Vec::new();

        loop {
            if limit.is_some_and(|l| entries.len() >= l) {
                break;
            }
            let segment = segments.next_segment().await.map_err(|e| {
                LedgerError::Storage(format!(
                    "Failed to read ledger {}: {}",
                    self.path.display(),
                    e
                ))
            })?;
            let Some(bytes) = segment else { break };
            if is_blank(&bytes) {
                continue;
            }
            entries.push(decode_line(&bytes));
        }

        Ok(entries)
    }

    fn name(&self) -> &str {
        "file"
    }
}
