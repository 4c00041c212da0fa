use crate::domain::account::{Account, AccountId, Amount, Ledger, Role};
use crate::domain::ports::LedgerStoreBox;
use crate::error::{BotError, Result};
use std::collections::HashSet;
use tokio::sync::Mutex;

/// Starting balances and the identities that open privileged accounts.
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub standard_balance: u64,
    pub privileged_balance: u64,
    pub privileged: HashSet<AccountId>,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            standard_balance: 100,
            privileged_balance: 1000,
            privileged: HashSet::new(),
        }
    }
}

impl LedgerSettings {
    pub fn with_privileged(mut self, ids: impl IntoIterator<Item = AccountId>) -> Self {
        self.privileged.extend(ids);
        self
    }

    fn new_account(&self, id: &AccountId) -> Account {
        if self.privileged.contains(id) {
            Account::new(id.clone(), Role::Privileged, self.privileged_balance)
        } else {
            Account::new(id.clone(), Role::Standard, self.standard_balance)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReceipt {
    pub from_balance: u64,
    pub to_balance: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeterReceipt {
    pub balance: u64,
    pub count: u64,
}

/// Owns the ledger and serialises every change to it.
///
/// Each mutating operation takes the lock, applies its change in memory, and
/// writes the full snapshot through the store before releasing the lock. If
/// the write fails, the accounts it touched are put back and the caller gets
/// `BotError::Persistence`.
pub struct LedgerEngine {
    ledger: Mutex<Ledger>,
    store: LedgerStoreBox,
    settings: LedgerSettings,
}

impl LedgerEngine {
    pub fn new(store: LedgerStoreBox, ledger: Ledger, settings: LedgerSettings) -> Self {
        Self {
            ledger: Mutex::new(ledger),
            store,
            settings,
        }
    }

    /// Loads the last snapshot from `store` and wraps it in an engine.
    pub async fn open(store: LedgerStoreBox, settings: LedgerSettings) -> Result<Self> {
        let ledger = store.load().await?;
        tracing::info!(accounts = ledger.len(), "ledger loaded");
        Ok(Self::new(store, ledger, settings))
    }

    async fn commit<T>(
        &self,
        touched: &[&AccountId],
        mutate: impl FnOnce(&mut Ledger) -> Result<T>,
    ) -> Result<T> {
        let mut ledger = self.ledger.lock().await;
        let before: Vec<(AccountId, Option<Account>)> = touched
            .iter()
            .map(|id| ((*id).clone(), ledger.get(id).cloned()))
            .collect();

        let outcome = match mutate(&mut ledger) {
            Ok(value) => match self.store.save(&ledger).await {
                Ok(()) => return Ok(value),
                Err(e) => {
                    tracing::error!(error = %e, "ledger write failed, rolling back");
                    e
                }
            },
            Err(e) => e,
        };

        for (id, previous) in before {
            ledger.restore(&id, previous);
        }
        Err(outcome)
    }

    fn account_mut<'a>(&self, ledger: &'a mut Ledger, id: &AccountId) -> &'a mut Account {
        ledger.get_or_insert_with(id, || {
            tracing::info!(account = %id, "opening account");
            self.settings.new_account(id)
        })
    }

    /// Makes sure `id` has an account and returns it.
    pub async fn open_account(&self, id: &AccountId) -> Result<Account> {
        if let Some(account) = self.account(id).await {
            return Ok(account);
        }
        self.commit(&[id], |ledger| Ok(self.account_mut(ledger, id).clone()))
            .await
    }

    pub async fn credit(&self, id: &AccountId, amount: Amount) -> Result<u64> {
        let balance = self
            .commit(&[id], |ledger| self.account_mut(ledger, id).credit(amount))
            .await?;
        tracing::info!(account = %id, %amount, balance, "credit");
        Ok(balance)
    }

    pub async fn debit(&self, id: &AccountId, amount: Amount) -> Result<u64> {
        let balance = self
            .commit(&[id], |ledger| self.account_mut(ledger, id).debit(amount))
            .await?;
        tracing::info!(account = %id, %amount, balance, "debit");
        Ok(balance)
    }

    /// Moves coins between two accounts in one snapshot write.
    ///
    /// The recipient must already have an account. Sending to yourself changes
    /// nothing and succeeds.
    pub async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<TransferReceipt> {
        if from == to {
            let balance = self.balance_of(from).await;
            return Ok(TransferReceipt {
                from_balance: balance,
                to_balance: balance,
            });
        }

        let receipt = self
            .commit(&[from, to], |ledger| {
                if !ledger.contains(to) {
                    return Err(BotError::UnknownAccount { id: to.to_string() });
                }
                let from_balance = self.account_mut(ledger, from).debit(amount)?;
                let to_balance = self.account_mut(ledger, to).credit(amount)?;
                Ok(TransferReceipt {
                    from_balance,
                    to_balance,
                })
            })
            .await?;
        tracing::info!(%from, %to, %amount, "transfer");
        Ok(receipt)
    }

    pub async fn increment_counter(&self, id: &AccountId, counter: &str) -> Result<u64> {
        self.commit(&[id], |ledger| {
            Ok(self.account_mut(ledger, id).increment_counter(counter))
        })
        .await
    }

    /// Charges for one use of a metered feature and counts the use.
    pub async fn charge_metered(
        &self,
        id: &AccountId,
        cost: Amount,
        counter: &str,
    ) -> Result<MeterReceipt> {
        self.commit(&[id], |ledger| {
            let account = self.account_mut(ledger, id);
            let balance = account.debit(cost)?;
            let count = account.increment_counter(counter);
            Ok(MeterReceipt { balance, count })
        })
        .await
    }

    /// Current balance, 0 for identities without an account.
    pub async fn balance_of(&self, id: &AccountId) -> u64 {
        self.ledger
            .lock()
            .await
            .get(id)
            .map_or(0, |account| account.balance)
    }

    pub async fn account(&self, id: &AccountId) -> Option<Account> {
        self.ledger.lock().await.get(id).cloned()
    }

    pub async fn accounts(&self) -> Vec<Account> {
        self.ledger.lock().await.accounts().cloned().collect()
    }
}
