use super::account::{AccountId, Ledger};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;

/// Durable home of the ledger snapshot.
///
/// `save` must be atomic: after a failure or crash the previous snapshot is
/// still what `load` returns.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Returns an empty ledger when nothing has been saved yet.
    async fn load(&self) -> Result<Ledger>;
    async fn save(&self, ledger: &Ledger) -> Result<()>;
}

/// Live view of who administers a group chat.
#[async_trait]
pub trait RosterLookup: Send + Sync {
    async fn privileged_members(&self, chat_id: &str) -> Result<HashSet<AccountId>>;
}

/// Moderation actions carried out by the messaging transport.
#[async_trait]
pub trait ChatModerator: Send + Sync {
    async fn ban(&self, chat_id: &str, member: &AccountId) -> Result<()>;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;
pub type RosterLookupBox = Box<dyn RosterLookup>;
pub type ChatModeratorBox = Box<dyn ChatModerator>;
