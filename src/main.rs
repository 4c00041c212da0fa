use clap::{Parser, Subcommand};
use coinbot::application::router::CommandRouter;
use coinbot::config::{BotConfig, Storage};
use coinbot::domain::account::{AccountId, Amount};
use coinbot::domain::auth::AuthorizationGuard;
use coinbot::domain::broadcast::BroadcastBoard;
use coinbot::interfaces::console::Console;
use coinbot::interfaces::csv::account_writer::AccountWriter;
use coinbot::interfaces::jsonl::{EventRoster, OutboxModerator, read_events, write_actions};
use miette::{IntoDiagnostic, Result};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Ledger snapshot file
    #[arg(long, env = "LEDGER_PATH", default_value = "users.json", global = true)]
    ledger_path: PathBuf,

    /// Path to a RocksDB ledger (requires the `storage-rocksdb` feature)
    #[arg(long, env = "LEDGER_DB_PATH", global = true)]
    db_path: Option<PathBuf>,

    /// Keep the ledger in memory only
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Privileged identities, comma separated
    #[arg(long = "admins", env = "ADMIN_IDS", value_delimiter = ',', global = true)]
    admins: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Handle chat events (JSON lines) from stdin and write actions to stdout
    Serve {
        /// The bot's own user id
        #[arg(long, env = "BOT_ID", default_value = "0")]
        bot_id: String,

        /// Coins charged per card check
        #[arg(long, env = "CHECK_COST", default_value_t = 1)]
        check_cost: u64,

        /// Also run an operator console reading commands from this file or FIFO
        #[arg(long)]
        operator_input: Option<PathBuf>,
    },
    /// Operator session on stdin. Refuses to start while another process has
    /// the ledger open; use `serve --operator-input` next to a running bot.
    Console,
    /// Write all accounts as CSV to stdout
    Export,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let storage = Storage::resolve(&cli.ledger_path, cli.db_path.as_deref(), cli.ephemeral);
    let mut config = BotConfig::new(storage, cli.admins).into_diagnostic()?;

    match cli.command {
        Command::Serve {
            bot_id,
            check_cost,
            operator_input,
        } => {
            config.bot_id = AccountId::from(bot_id);
            config.check_cost = Amount::new(check_cost).into_diagnostic()?;
            serve(config, operator_input).await
        }
        Command::Console => {
            let ledger = config.open_ledger().await.into_diagnostic()?;
            Console::new(ledger, Arc::new(BroadcastBoard::new()))
                .run_session(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                .await
                .into_diagnostic()
        }
        Command::Export => {
            let ledger = config.open_ledger().await.into_diagnostic()?;
            let accounts = ledger.accounts().await;
            let stdout = io::stdout();
            let mut writer = AccountWriter::new(stdout.lock());
            writer.write_accounts(&accounts).into_diagnostic()
        }
    }
}

async fn serve(config: BotConfig, operator_input: Option<PathBuf>) -> Result<()> {
    let ledger = config.open_ledger().await.into_diagnostic()?;
    let broadcasts = Arc::new(BroadcastBoard::new());
    let roster = EventRoster::new();
    let (outbox, actions) = mpsc::unbounded_channel();

    let guard = AuthorizationGuard::new(
        config.admins.clone(),
        config.bot_id.clone(),
        Box::new(roster.clone()),
    );
    let router = CommandRouter::new(
        ledger.clone(),
        guard,
        broadcasts.clone(),
        Box::new(OutboxModerator::new(outbox.clone())),
        config.check_cost,
    );

    if let Some(path) = operator_input {
        let file = tokio::fs::File::open(&path).await.into_diagnostic()?;
        let console = Console::new(ledger, broadcasts);
        tokio::spawn(async move {
            if let Err(e) = console
                .run_session(BufReader::new(file), tokio::io::stderr())
                .await
            {
                tracing::error!(error = %e, "operator console stopped");
            }
        });
    }

    let writer = tokio::spawn(write_actions(tokio::io::stdout(), actions));
    tracing::info!(bot_id = %config.bot_id, admins = config.admins.len(), "serving chat events");

    read_events(BufReader::new(tokio::io::stdin()), &router, &roster, &outbox)
        .await
        .into_diagnostic()?;

    // The writer drains until every sender is gone, including the moderator's.
    drop(router);
    drop(outbox);
    writer.await.into_diagnostic()?.into_diagnostic()?;
    Ok(())
}
