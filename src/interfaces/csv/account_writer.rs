use crate::domain::account::{Account, CARDS_CHECKED, Role, WARNINGS};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct AccountRow<'a> {
    account: &'a str,
    balance: u64,
    role: Role,
    cards_checked: u64,
    warnings: u64,
}

/// Writes ledger accounts as CSV, one row per account.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes the header and every account, then flushes.
    pub fn write_accounts<'a>(
        &mut self,
        accounts: impl IntoIterator<Item = &'a Account>,
    ) -> Result<()> {
        for account in accounts {
            self.writer.serialize(AccountRow {
                account: account.id.as_str(),
                balance: account.balance,
                role: account.role,
                cards_checked: account.counter(CARDS_CHECKED),
                warnings: account.counter(WARNINGS),
            })?;
        }
        self.writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}
