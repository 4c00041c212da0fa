use crate::application::ledger::LedgerEngine;
use crate::domain::account::{AccountId, Amount};
use crate::domain::broadcast::BroadcastBoard;
use crate::error::{BotError, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const HELP: &str = "commands: balance <id> | credit <id> <coins> | debit <id> <coins> | \
transfer <from> <to> <coins> | broadcast <message> | accounts | help | quit";

/// Operator session that works on the ledger directly, next to the chat loop.
pub struct Console {
    ledger: Arc<LedgerEngine>,
    broadcasts: Arc<BroadcastBoard>,
}

impl Console {
    pub fn new(ledger: Arc<LedgerEngine>, broadcasts: Arc<BroadcastBoard>) -> Self {
        Self { ledger, broadcasts }
    }

    /// Runs one operator command and returns the text to show.
    pub async fn execute(&self, line: &str) -> String {
        match self.run(line).await {
            Ok(output) => output,
            Err(BotError::Format { usage }) => format!("usage: {usage}"),
            Err(err) => format!("error: {err}"),
        }
    }

    async fn run(&self, line: &str) -> Result<String> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(String::new());
        };
        let args: Vec<&str> = words.collect();

        match (command, args.as_slice()) {
            ("balance", [id]) => {
                let id = AccountId::from(*id);
                Ok(format!("{id}: {}", self.ledger.balance_of(&id).await))
            }
            ("credit", [id, amount]) => {
                let id = AccountId::from(*id);
                let balance = self.ledger.credit(&id, amount.parse()?).await?;
                Ok(format!("{id}: {balance}"))
            }
            ("debit", [id, amount]) => {
                let id = AccountId::from(*id);
                let balance = self.ledger.debit(&id, amount.parse()?).await?;
                Ok(format!("{id}: {balance}"))
            }
            ("transfer", [from, to, amount]) => {
                let (from, to) = (AccountId::from(*from), AccountId::from(*to));
                let amount: Amount = amount.parse()?;
                let receipt = self.ledger.transfer(&from, &to, amount).await?;
                Ok(format!(
                    "{from}: {}, {to}: {}",
                    receipt.from_balance, receipt.to_balance
                ))
            }
            ("broadcast", words) if !words.is_empty() => {
                let count = self.broadcasts.publish(words.join(" ")).await;
                Ok(format!("broadcast queued ({count} total)"))
            }
            ("accounts", []) => {
                let accounts = self.ledger.accounts().await;
                let lines: Vec<String> = accounts
                    .iter()
                    .map(|a| format!("{} {} {:?}", a.id, a.balance, a.role))
                    .collect();
                Ok(lines.join("\n"))
            }
            ("help", _) => Ok(HELP.to_string()),
            _ => Err(BotError::Format { usage: HELP }),
        }
    }

    /// Reads commands until end of input or `quit`.
    pub async fn run_session<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line == "quit" || line == "exit" {
                break;
            }
            if line.is_empty() {
                continue;
            }
            let output = self.execute(line).await;
            writer.write_all(output.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok(())
    }
}
