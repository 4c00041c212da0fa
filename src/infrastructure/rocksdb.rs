use crate::domain::account::{Account, AccountId, Ledger};
use crate::domain::ports::LedgerStore;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options, WriteBatch, WriteOptions};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Column Family holding one record per account.
pub const CF_ACCOUNTS: &str = "accounts";

/// A persistent ledger store backed by RocksDB.
///
/// Each account is its own key in the `accounts` column family. A snapshot is
/// written as a single synced `WriteBatch`, so it lands completely or not at all.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbLedgerStore {
    db: Arc<DB>,
}

impl RocksDbLedgerStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_accounts = ColumnFamilyDescriptor::new(CF_ACCOUNTS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_accounts])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn accounts_cf(&self) -> Result<&ColumnFamily> {
        self.db.cf_handle(CF_ACCOUNTS).ok_or_else(|| {
            BotError::Persistence(Box::new(std::io::Error::other(
                "Accounts column family not found",
            )))
        })
    }
}

#[async_trait]
impl LedgerStore for RocksDbLedgerStore {
    async fn load(&self) -> Result<Ledger> {
        let cf = self.accounts_cf()?;
        let mut accounts = BTreeMap::new();

        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (key, value) = item?;
            let id = AccountId::new(String::from_utf8_lossy(&key).into_owned());
            let account: Account = serde_json::from_slice(&value)?;
            accounts.insert(id, account);
        }

        Ok(Ledger::from(accounts))
    }

    async fn save(&self, ledger: &Ledger) -> Result<()> {
        let cf = self.accounts_cf()?;
        let mut batch = WriteBatch::default();

        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (key, _) = item?;
            let id = AccountId::new(String::from_utf8_lossy(&key).into_owned());
            if !ledger.contains(&id) {
                batch.delete_cf(cf, key);
            }
        }
        for account in ledger.accounts() {
            batch.put_cf(cf, account.id.as_str().as_bytes(), serde_json::to_vec(account)?);
        }

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);
        self.db.write_opt(batch, &write_opts)?;

        Ok(())
    }
}
