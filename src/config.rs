use crate::application::ledger::{LedgerEngine, LedgerSettings};
use crate::domain::account::{AccountId, Amount};
use crate::domain::ports::LedgerStoreBox;
use crate::error::Result;
use crate::infrastructure::in_memory::InMemoryLedgerStore;
use crate::infrastructure::json_file::JsonFileLedgerStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where the ledger snapshot lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    Ephemeral,
    JsonFile(PathBuf),
    RocksDb(PathBuf),
}

impl Storage {
    /// `--ephemeral` wins, then `--db-path`, then the JSON file.
    pub fn resolve(ledger_path: &Path, db_path: Option<&Path>, ephemeral: bool) -> Self {
        if ephemeral {
            Storage::Ephemeral
        } else if let Some(db_path) = db_path {
            Storage::RocksDb(db_path.to_path_buf())
        } else {
            Storage::JsonFile(ledger_path.to_path_buf())
        }
    }
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub storage: Storage,
    /// Static allow-list of privileged identities.
    pub admins: Vec<AccountId>,
    /// The bot's own identity, never a valid moderation target.
    pub bot_id: AccountId,
    /// Coins charged per card check.
    pub check_cost: Amount,
    pub standard_balance: u64,
    pub privileged_balance: u64,
}

impl BotConfig {
    pub fn new(storage: Storage, admins: impl IntoIterator<Item = String>) -> Result<Self> {
        let defaults = LedgerSettings::default();
        Ok(Self {
            storage,
            admins: admins
                .into_iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .map(AccountId::from)
                .collect(),
            bot_id: AccountId::from("0"),
            check_cost: Amount::new(1)?,
            standard_balance: defaults.standard_balance,
            privileged_balance: defaults.privileged_balance,
        })
    }

    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            standard_balance: self.standard_balance,
            privileged_balance: self.privileged_balance,
            ..LedgerSettings::default()
        }
        .with_privileged(self.admins.iter().cloned())
    }

    pub fn open_store(&self) -> Result<LedgerStoreBox> {
        match &self.storage {
            Storage::Ephemeral => Ok(Box::new(InMemoryLedgerStore::new())),
            Storage::JsonFile(path) => Ok(Box::new(JsonFileLedgerStore::open(path)?)),
            #[cfg(feature = "storage-rocksdb")]
            Storage::RocksDb(path) => Ok(Box::new(
                crate::infrastructure::rocksdb::RocksDbLedgerStore::open(path)?,
            )),
            #[cfg(not(feature = "storage-rocksdb"))]
            Storage::RocksDb(path) => {
                tracing::warn!(
                    db_path = %path.display(),
                    "persistent storage requested via --db-path, but the 'storage-rocksdb' feature is not enabled; falling back to in-memory storage"
                );
                Ok(Box::new(InMemoryLedgerStore::new()))
            }
        }
    }

    pub async fn open_ledger(&self) -> Result<Arc<LedgerEngine>> {
        let engine = LedgerEngine::open(self.open_store()?, self.ledger_settings()).await?;
        Ok(Arc::new(engine))
    }
}
