use crate::domain::account::{AccountId, Ledger};
use crate::domain::ports::{ChatModerator, LedgerStore, RosterLookup};
use crate::error::{BotError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// A ledger store that keeps the last saved snapshot in memory.
///
/// Clones share the same snapshot, so a test can keep a handle and inspect
/// what the engine persisted. Writes can be made to fail on demand.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    snapshot: Arc<RwLock<Option<Ledger>>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose first `load` returns `ledger`.
    pub fn with_ledger(ledger: Ledger) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(Some(ledger))),
            fail_writes: Arc::default(),
        }
    }

    /// While set, every `save` fails and the stored snapshot is left as it was.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> Option<Ledger> {
        self.snapshot.read().await.clone()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn load(&self) -> Result<Ledger> {
        Ok(self.snapshot.read().await.clone().unwrap_or_default())
    }

    async fn save(&self, ledger: &Ledger) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BotError::from(std::io::Error::other(
                "injected write failure",
            )));
        }
        *self.snapshot.write().await = Some(ledger.clone());
        Ok(())
    }
}

/// Fixed group rosters, for tests and transports without a live lookup.
#[derive(Default, Clone)]
pub struct StaticRoster {
    groups: HashMap<String, HashSet<AccountId>>,
}

impl StaticRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admins<I, S>(mut self, chat_id: &str, admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<AccountId>,
    {
        self.groups
            .entry(chat_id.to_string())
            .or_default()
            .extend(admins.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl RosterLookup for StaticRoster {
    async fn privileged_members(&self, chat_id: &str) -> Result<HashSet<AccountId>> {
        self.groups
            .get(chat_id)
            .cloned()
            .ok_or_else(|| BotError::RosterUnavailable {
                chat_id: chat_id.to_string(),
            })
    }
}

/// Remembers every ban it was asked to carry out.
#[derive(Default, Clone)]
pub struct RecordingModerator {
    bans: Arc<RwLock<Vec<(String, AccountId)>>>,
}

impl RecordingModerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn bans(&self) -> Vec<(String, AccountId)> {
        self.bans.read().await.clone()
    }
}

#[async_trait]
impl ChatModerator for RecordingModerator {
    async fn ban(&self, chat_id: &str, member: &AccountId) -> Result<()> {
        tracing::info!(chat_id, member = %member, "ban recorded");
        self.bans
            .write()
            .await
            .push((chat_id.to_string(), member.clone()));
        Ok(())
    }
}
