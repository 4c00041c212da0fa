use crate::domain::account::Ledger;
use crate::domain::ports::LedgerStore;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::fs::{File, OpenOptions, TryLockError};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Persists the whole ledger as one JSON document.
///
/// Saves go to a temporary file in the same directory, are flushed to disk,
/// and then renamed over the target. A crash at any point leaves either the
/// old or the new snapshot in place, never a truncated one.
///
/// While a store is alive it holds an exclusive lock on `<path>.lock`, so two
/// processes can never write whole snapshots over each other. Clones share
/// the lock, which is released when the last one is dropped.
#[derive(Debug, Clone)]
pub struct JsonFileLedgerStore {
    path: PathBuf,
    _lock: Arc<File>,
}

impl JsonFileLedgerStore {
    /// Opens the store at `path`, failing with `BotError::LedgerLocked` when
    /// another store already has it open.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_path = Self::lock_path(&path);
        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;

        match lock.try_lock() {
            Ok(()) => Ok(Self {
                path,
                _lock: Arc::new(lock),
            }),
            Err(TryLockError::WouldBlock) => {
                tracing::error!(
                    path = %path.display(),
                    "ledger is locked by another process"
                );
                Err(BotError::LedgerLocked {
                    path: path.display().to_string(),
                })
            }
            Err(TryLockError::Error(e)) => Err(e.into()),
        }
    }

    fn lock_path(path: &Path) -> PathBuf {
        let mut name = OsString::from(path.as_os_str());
        name.push(".lock");
        PathBuf::from(name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }
}

#[async_trait]
impl LedgerStore for JsonFileLedgerStore {
    async fn load(&self) -> Result<Ledger> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(
                    path = %self.path.display(),
                    "no ledger snapshot yet, starting empty"
                );
                Ok(Ledger::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, ledger: &Ledger) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(ledger)?;

        let mut tmp = NamedTempFile::new_in(self.directory())?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;

        tracing::debug!(
            path = %self.path.display(),
            accounts = ledger.len(),
            "ledger snapshot written"
        );
        Ok(())
    }
}
