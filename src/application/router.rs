use super::ledger::LedgerEngine;
use crate::domain::account::{AccountId, Amount, CARDS_CHECKED, WARNINGS};
use crate::domain::auth::{AuthorizationGuard, Denial, Invocation, Requirement};
use crate::domain::broadcast::BroadcastBoard;
use crate::domain::card::{self, Verdict};
use crate::domain::ports::ChatModeratorBox;
use crate::error::{BotError, Result};
use std::sync::Arc;

/// A text message addressed to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub invocation: Invocation,
    pub text: String,
}

/// The bot's answer, to be sent to the chat the command came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub chat_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handler {
    Start,
    Help,
    Balance,
    Add,
    Transfer,
    Check,
    Broadcast,
    Ban,
    Warn,
}

struct Route {
    name: &'static str,
    aliases: &'static [&'static str],
    requirement: Requirement,
    handler: Handler,
    usage: &'static str,
    summary: &'static str,
}

const ROUTES: &[Route] = &[
    Route {
        name: "start",
        aliases: &[],
        requirement: Requirement::None,
        handler: Handler::Start,
        usage: "/start",
        summary: "open your account and show this menu",
    },
    Route {
        name: "help",
        aliases: &[],
        requirement: Requirement::None,
        handler: Handler::Help,
        usage: "/help",
        summary: "list commands",
    },
    Route {
        name: "balance",
        aliases: &["coins"],
        requirement: Requirement::None,
        handler: Handler::Balance,
        usage: "/balance",
        summary: "show your coin balance",
    },
    Route {
        name: "add",
        aliases: &[],
        requirement: Requirement::Privileged,
        handler: Handler::Add,
        usage: "/add <user_id> <coins>",
        summary: "admin: add coins to a user",
    },
    Route {
        name: "transfer",
        aliases: &[],
        requirement: Requirement::None,
        handler: Handler::Transfer,
        usage: "/transfer <user_id> <coins>",
        summary: "send coins to another user",
    },
    Route {
        name: "chk",
        aliases: &[],
        requirement: Requirement::None,
        handler: Handler::Check,
        usage: "/chk number|mm|yy|cvv",
        summary: "checksum-validate a card number (costs coins)",
    },
    Route {
        name: "broadcast",
        aliases: &[],
        requirement: Requirement::Privileged,
        handler: Handler::Broadcast,
        usage: "/broadcast <message>",
        summary: "admin: announce to every user",
    },
    Route {
        name: "ban",
        aliases: &[],
        requirement: Requirement::GroupScoped,
        handler: Handler::Ban,
        usage: "/ban (as a reply)",
        summary: "admin: ban the author of the replied message",
    },
    Route {
        name: "warn",
        aliases: &[],
        requirement: Requirement::GroupScoped,
        handler: Handler::Warn,
        usage: "/warn (as a reply)",
        summary: "admin: warn the author of the replied message",
    },
];

fn route(name: &str) -> Option<&'static Route> {
    ROUTES
        .iter()
        .find(|r| r.name == name || r.aliases.contains(&name))
}

/// Splits `/name args` or `.name args` into a lower-cased name and the
/// remaining text. A `@botname` suffix on the name is dropped.
///
/// Any `/` line is a command, known or not. A `.` line only counts when it
/// names a known command, so chatter like `...ok` is left alone.
pub fn parse_command(text: &str) -> Option<(String, &str)> {
    let text = text.trim_start();
    let (rest, dotted) = match text.strip_prefix('/') {
        Some(rest) => (rest, false),
        None => (text.strip_prefix('.')?, true),
    };
    let (head, args) = match rest.find(char::is_whitespace) {
        Some(split) => (&rest[..split], rest[split..].trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or_default().to_ascii_lowercase();
    if name.is_empty() || (dotted && route(&name).is_none()) {
        return None;
    }
    Some((name, args))
}

/// Reads `<user_id> <coins>`.
fn target_and_amount(args: &str, usage: &'static str) -> Result<(AccountId, Amount)> {
    let mut parts = args.split_whitespace();
    let (Some(target), Some(amount), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(BotError::Format { usage });
    };
    let amount = amount
        .parse::<Amount>()
        .map_err(|_| BotError::Format { usage })?;
    Ok((AccountId::from(target), amount))
}

fn mask(number: &str) -> String {
    let tail: String = number
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("•••• {tail}")
}

/// Maps inbound commands to ledger, validator and moderation actions.
///
/// Every failure is turned into reply text; nothing a caller sends can make
/// `handle` return an error.
pub struct CommandRouter {
    ledger: Arc<LedgerEngine>,
    guard: AuthorizationGuard,
    broadcasts: Arc<BroadcastBoard>,
    moderator: ChatModeratorBox,
    check_cost: Amount,
}

impl CommandRouter {
    pub fn new(
        ledger: Arc<LedgerEngine>,
        guard: AuthorizationGuard,
        broadcasts: Arc<BroadcastBoard>,
        moderator: ChatModeratorBox,
        check_cost: Amount,
    ) -> Self {
        Self {
            ledger,
            guard,
            broadcasts,
            moderator,
            check_cost,
        }
    }

    /// Returns `None` for messages that are not commands at all.
    pub async fn handle(&self, inbound: &Inbound) -> Option<Reply> {
        let (name, args) = parse_command(&inbound.text)?;
        let caller = &inbound.invocation.caller;

        let body = match route(&name) {
            None => {
                tracing::debug!(%caller, command = %name, "unrecognized command");
                "❓ Unrecognized command. Send /help for the list.".to_string()
            }
            Some(route) => {
                tracing::info!(%caller, command = route.name, "dispatch");
                match self.dispatch(route, &inbound.invocation, args).await {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::warn!(
                            %caller,
                            command = route.name,
                            error = %err,
                            "command failed"
                        );
                        user_message(&err, route)
                    }
                }
            }
        };

        let pending = self.broadcasts.take_unseen(caller).await;
        let text = if pending.is_empty() {
            body
        } else {
            let mut text = String::from("📢 New broadcasts:\n");
            for message in pending {
                text.push_str(&format!("• {message}\n"));
            }
            text.push('\n');
            text.push_str(&body);
            text
        };

        Some(Reply {
            chat_id: inbound.invocation.chat.id.clone(),
            text,
        })
    }

    async fn dispatch(&self, route: &Route, invocation: &Invocation, args: &str) -> Result<String> {
        let target = self.guard.authorize(route.requirement, invocation).await?;
        let caller = &invocation.caller;

        match route.handler {
            Handler::Start => {
                let account = self.ledger.open_account(caller).await?;
                Ok(format!(
                    "🤖 Coin bot ready. Your balance: {}\n\n{}",
                    account.balance,
                    help_text()
                ))
            }
            Handler::Help => Ok(help_text()),
            Handler::Balance => {
                let balance = self.ledger.balance_of(caller).await;
                Ok(format!("💰 Your coin balance: {balance}"))
            }
            Handler::Add => {
                let (target, amount) = target_and_amount(args, route.usage)?;
                let balance = self.ledger.credit(&target, amount).await?;
                Ok(format!(
                    "✅ Added {amount} coins to user {target}! New balance: {balance}"
                ))
            }
            Handler::Transfer => {
                let (target, amount) = target_and_amount(args, route.usage)?;
                let receipt = self.ledger.transfer(caller, &target, amount).await?;
                Ok(format!(
                    "✅ Transferred {amount} coins to user {target}! Your balance: {}",
                    receipt.from_balance
                ))
            }
            Handler::Check => {
                if args.is_empty() {
                    return Err(BotError::Format { usage: route.usage });
                }
                // Charged before the result is known; no refund on any verdict.
                let receipt = self
                    .ledger
                    .charge_metered(caller, self.check_cost, CARDS_CHECKED)
                    .await?;
                let outcome = card::check(args);
                let number = args.split('|').next().unwrap_or_default().trim();
                let mut text = format!(
                    "🃏 Card: {}\n📊 Status: {} ({})\n💳 Brand: {}\n",
                    mask(number),
                    outcome.verdict.status(),
                    outcome.verdict.code(),
                    outcome.brand,
                );
                if let Verdict::Invalid(reason) = outcome.verdict {
                    text.push_str(&format!("⚠️ {reason}\n"));
                }
                text.push_str(&format!(
                    "💰 Remaining coins: {}\n🔢 Cards checked: {}",
                    receipt.balance, receipt.count
                ));
                Ok(text)
            }
            Handler::Broadcast => {
                if args.is_empty() {
                    return Err(BotError::Format { usage: route.usage });
                }
                let count = self.broadcasts.publish_from(caller, args).await;
                tracing::info!(%caller, count, "broadcast published");
                Ok("✅ Broadcast sent to all users!".to_string())
            }
            Handler::Ban => {
                let target = target.ok_or(Denial::NoReplyTarget)?;
                self.moderator.ban(&invocation.chat.id, &target).await?;
                Ok(format!("🚫 Banned user {target}!"))
            }
            Handler::Warn => {
                let target = target.ok_or(Denial::NoReplyTarget)?;
                let warnings = self.ledger.increment_counter(&target, WARNINGS).await?;
                Ok(format!(
                    "⚠️ Warning sent to user {target}! (warning #{warnings})"
                ))
            }
        }
    }
}

fn help_text() -> String {
    let mut text = String::from("Available commands:\n");
    for route in ROUTES {
        text.push_str(&format!("{} - {}\n", route.usage, route.summary));
    }
    text.push_str(".chk number|mm|yy|cvv works too");
    text
}

fn user_message(err: &BotError, route: &Route) -> String {
    match err {
        BotError::Format { usage } => format!("Usage: {usage}"),
        BotError::InvalidAmount(message) => format!("❌ {message}"),
        BotError::InsufficientFunds {
            available,
            required,
        } => format!(
            "❌ Insufficient coins! You have {available}, this needs {required}. Ask an admin to add coins."
        ),
        BotError::AuthorizationDenied(denial) => match denial {
            Denial::NotPrivileged => "❌ Only admins can use this command!".to_string(),
            Denial::NotInGroup => "❌ This command works only in groups!".to_string(),
            Denial::NoReplyTarget => {
                format!("⚠️ Reply to a user's message to {}!", route.name)
            }
            Denial::SelfTarget => format!("🤖 I can't {} myself!", route.name),
            Denial::TargetIsPrivileged => format!("❌ Cannot {} admins!", route.name),
        },
        BotError::UnknownAccount { id } => {
            format!("❌ Unknown user {id}. They need to /start the bot first.")
        }
        BotError::RosterUnavailable { .. } => format!(
            "⚠️ I don't know this group's admins yet, so I can't {} anyone. Try again shortly.",
            route.name
        ),
        BotError::Persistence(_) => {
            "⚠️ Could not save the change, nothing was applied. Please try again.".to_string()
        }
        BotError::Csv(_) | BotError::LedgerLocked { .. } => {
            "⚠️ Something went wrong, please try again.".to_string()
        }
    }
}
