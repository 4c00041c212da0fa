//! Line-delimited JSON transport.
//!
//! Each input line is one chat event; each output line is one action for the
//! messenger to carry out (a reply or a ban). A messenger client sits on the
//! other side of the pipe, so this is the only place that knows the wire shape.

use crate::application::router::{CommandRouter, Inbound};
use crate::domain::account::AccountId;
use crate::domain::auth::{ChatContext, Invocation};
use crate::domain::ports::{ChatModerator, RosterLookup};
use crate::error::{BotError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{RwLock, mpsc};

/// One inbound chat event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatEvent {
    pub caller: String,
    pub chat: ChatContext,
    pub text: String,
    #[serde(default)]
    pub reply_to: Option<String>,
    /// Current group admins, when the messenger includes them.
    #[serde(default)]
    pub group_admins: Option<Vec<String>>,
}

impl ChatEvent {
    fn into_inbound(self) -> Inbound {
        Inbound {
            invocation: Invocation {
                caller: AccountId::from(self.caller),
                chat: self.chat,
                reply_to: self.reply_to.map(AccountId::from),
            },
            text: self.text,
        }
    }
}

/// One outbound action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Outbound {
    Reply { chat_id: String, text: String },
    Ban { chat_id: String, member: String },
}

/// Group admin lists as last reported by the messenger.
#[derive(Default, Clone)]
pub struct EventRoster {
    groups: Arc<RwLock<HashMap<String, HashSet<AccountId>>>>,
}

impl EventRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn update(&self, chat_id: &str, admins: Vec<String>) {
        let admins = admins.into_iter().map(AccountId::from).collect();
        self.groups.write().await.insert(chat_id.to_string(), admins);
    }
}

#[async_trait]
impl RosterLookup for EventRoster {
    /// Fails for groups whose admins were never reported, so moderation
    /// checks cannot pass on a roster nobody has seen.
    async fn privileged_members(&self, chat_id: &str) -> Result<HashSet<AccountId>> {
        self.groups
            .read()
            .await
            .get(chat_id)
            .cloned()
            .ok_or_else(|| BotError::RosterUnavailable {
                chat_id: chat_id.to_string(),
            })
    }
}

/// Hands ban requests to the output writer.
#[derive(Clone)]
pub struct OutboxModerator {
    outbox: mpsc::UnboundedSender<Outbound>,
}

impl OutboxModerator {
    pub fn new(outbox: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { outbox }
    }
}

#[async_trait]
impl ChatModerator for OutboxModerator {
    async fn ban(&self, chat_id: &str, member: &AccountId) -> Result<()> {
        self.outbox
            .send(Outbound::Ban {
                chat_id: chat_id.to_string(),
                member: member.to_string(),
            })
            .map_err(|_| BotError::from(std::io::Error::other("outbox closed")))
    }
}

/// Reads events until end of input, handing each to the router in order.
///
/// Lines that are not valid events are logged and skipped. Reading stops with
/// an error once replies can no longer be delivered, so no further commands
/// are applied without an answer.
pub async fn read_events<R>(
    reader: R,
    router: &CommandRouter,
    roster: &EventRoster,
    outbox: &mpsc::UnboundedSender<Outbound>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let event: ChatEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed event");
                continue;
            }
        };
        if let Some(admins) = event.group_admins.clone() {
            roster.update(&event.chat.id, admins).await;
        }

        if let Some(reply) = router.handle(&event.into_inbound()).await {
            let action = Outbound::Reply {
                chat_id: reply.chat_id,
                text: reply.text,
            };
            if outbox.send(action).is_err() {
                tracing::error!("action writer is gone, no longer reading events");
                return Err(BotError::from(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "action writer closed",
                )));
            }
        }
    }
    Ok(())
}

/// Writes actions as JSON lines until every sender is gone.
pub async fn write_actions<W>(
    mut writer: W,
    mut outbox: mpsc::UnboundedReceiver<Outbound>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(action) = outbox.recv().await {
        let mut line = serde_json::to_vec(&action)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}
