use crate::error::{BotError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Counter bumped by every metered card check.
pub const CARDS_CHECKED: &str = "cards_checked";
/// Counter bumped by every moderation warning an account receives.
pub const WARNINGS: &str = "warnings";

/// Opaque account identifier, stable across sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A strictly positive number of coins.
///
/// Every ledger mutation takes an `Amount`, so zero and negative movements are
/// rejected before any lock is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(u64);

impl Amount {
    pub fn new(value: u64) -> Result<Self> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(BotError::InvalidAmount(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for Amount {
    type Error = BotError;

    fn try_from(value: u64) -> Result<Self> {
        Self::new(value)
    }
}

impl FromStr for Amount {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim().parse::<u64>().map_err(|_| {
            BotError::InvalidAmount(format!("'{s}' is not a positive whole number of coins"))
        })?;
        Self::new(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Standard,
    Privileged,
}

/// The persisted state of one ledger account.
///
/// The identifier is the key of the snapshot map and is not repeated in the
/// record. Missing fields default and unknown fields are ignored, so older and
/// newer snapshots stay readable, including the layouts of earlier releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredAccount")]
pub struct Account {
    #[serde(skip)]
    pub id: AccountId,
    pub balance: u64,
    pub role: Role,
    pub counters: BTreeMap<String, u64>,
}

/// Every account shape found in `users.json` files, oldest first:
/// a bare coin count, a `{coins, is_admin, cards_checked}` record, and the
/// current `{balance, role, counters}` record.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredAccount {
    Coins(u64),
    Record(AccountRecord),
}

#[derive(Deserialize)]
struct AccountRecord {
    #[serde(default, alias = "coins")]
    balance: u64,
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    is_admin: bool,
    #[serde(default)]
    counters: BTreeMap<String, u64>,
    #[serde(default)]
    cards_checked: Option<u64>,
}

impl From<StoredAccount> for Account {
    fn from(stored: StoredAccount) -> Self {
        match stored {
            StoredAccount::Coins(balance) => Self {
                id: AccountId::default(),
                balance,
                role: Role::Standard,
                counters: BTreeMap::new(),
            },
            StoredAccount::Record(record) => {
                let role = record.role.unwrap_or(if record.is_admin {
                    Role::Privileged
                } else {
                    Role::Standard
                });
                let mut counters = record.counters;
                if let Some(checked) = record.cards_checked {
                    counters.entry(CARDS_CHECKED.to_string()).or_insert(checked);
                }
                Self {
                    id: AccountId::default(),
                    balance: record.balance,
                    role,
                    counters,
                }
            }
        }
    }
}

impl Account {
    pub fn new(id: AccountId, role: Role, starting_balance: u64) -> Self {
        Self {
            id,
            balance: starting_balance,
            role,
            counters: BTreeMap::new(),
        }
    }

    /// Adds coins to the balance and returns the new balance.
    pub fn credit(&mut self, amount: Amount) -> Result<u64> {
        self.balance = self.balance.checked_add(amount.value()).ok_or_else(|| {
            BotError::InvalidAmount(format!("crediting {amount} would overflow the balance"))
        })?;
        Ok(self.balance)
    }

    /// Removes coins if the balance covers them. Leaves the account untouched otherwise.
    pub fn debit(&mut self, amount: Amount) -> Result<u64> {
        if self.balance >= amount.value() {
            self.balance -= amount.value();
            Ok(self.balance)
        } else {
            Err(BotError::InsufficientFunds {
                available: self.balance,
                required: amount.value(),
            })
        }
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn increment_counter(&mut self, name: &str) -> u64 {
        let count = self.counters.entry(name.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }
}

/// All accounts, keyed by identifier. This is the unit of persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<AccountId, Account>",
    into = "BTreeMap<AccountId, Account>"
)]
pub struct Ledger {
    accounts: BTreeMap<AccountId, Account>,
}

impl From<BTreeMap<AccountId, Account>> for Ledger {
    fn from(mut accounts: BTreeMap<AccountId, Account>) -> Self {
        for (id, account) in accounts.iter_mut() {
            account.id = id.clone();
        }
        Self { accounts }
    }
}

impl From<Ledger> for BTreeMap<AccountId, Account> {
    fn from(ledger: Ledger) -> Self {
        ledger.accounts
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.get(id)
    }

    pub fn get_mut(&mut self, id: &AccountId) -> Option<&mut Account> {
        self.accounts.get_mut(id)
    }

    pub fn contains(&self, id: &AccountId) -> bool {
        self.accounts.contains_key(id)
    }

    pub fn insert(&mut self, account: Account) {
        self.accounts.insert(account.id.clone(), account);
    }

    pub fn get_or_insert_with(
        &mut self,
        id: &AccountId,
        create: impl FnOnce() -> Account,
    ) -> &mut Account {
        self.accounts.entry(id.clone()).or_insert_with(create)
    }

    /// Puts an account back to a previously captured state. `None` removes it.
    pub fn restore(&mut self, id: &AccountId, previous: Option<Account>) {
        match previous {
            Some(account) => {
                self.accounts.insert(id.clone(), account);
            }
            None => {
                self.accounts.remove(id);
            }
        }
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
