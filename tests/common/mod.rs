#![allow(dead_code)]

use coinbot::application::ledger::{LedgerEngine, LedgerSettings};
use coinbot::application::router::{CommandRouter, Inbound};
use coinbot::domain::account::{AccountId, Amount};
use coinbot::domain::auth::{AuthorizationGuard, ChatContext, Invocation};
use coinbot::domain::broadcast::BroadcastBoard;
use coinbot::infrastructure::in_memory::{InMemoryLedgerStore, RecordingModerator, StaticRoster};
use std::sync::Arc;

pub const ADMIN: &str = "1";
pub const BOT: &str = "999";
pub const GROUP: &str = "-100";
pub const GROUP_ADMIN: &str = "50";

pub fn id(s: &str) -> AccountId {
    AccountId::from(s)
}

pub fn coins(n: u64) -> Amount {
    Amount::new(n).unwrap()
}

pub struct Harness {
    pub router: CommandRouter,
    pub ledger: Arc<LedgerEngine>,
    pub store: InMemoryLedgerStore,
    pub moderator: RecordingModerator,
    pub broadcasts: Arc<BroadcastBoard>,
}

pub async fn harness() -> Harness {
    let store = InMemoryLedgerStore::new();
    let settings = LedgerSettings::default().with_privileged([id(ADMIN)]);
    let ledger = Arc::new(
        LedgerEngine::open(Box::new(store.clone()), settings)
            .await
            .unwrap(),
    );
    let roster = StaticRoster::new().with_admins(GROUP, [GROUP_ADMIN]);
    let guard = AuthorizationGuard::new([id(ADMIN)], id(BOT), Box::new(roster));
    let moderator = RecordingModerator::new();
    let broadcasts = Arc::new(BroadcastBoard::new());
    let router = CommandRouter::new(
        ledger.clone(),
        guard,
        broadcasts.clone(),
        Box::new(moderator.clone()),
        coins(1),
    );

    Harness {
        router,
        ledger,
        store,
        moderator,
        broadcasts,
    }
}

impl Harness {
    /// Sends `text` from `caller` in a private chat and returns the reply text.
    pub async fn private(&self, caller: &str, text: &str) -> String {
        self.send(caller, ChatContext::private(caller), None, text)
            .await
    }

    /// Sends `text` from `caller` in the test group, replying to `reply_to`.
    pub async fn group(&self, caller: &str, reply_to: Option<&str>, text: &str) -> String {
        self.send(caller, ChatContext::group(GROUP), reply_to, text)
            .await
    }

    pub async fn send(
        &self,
        caller: &str,
        chat: ChatContext,
        reply_to: Option<&str>,
        text: &str,
    ) -> String {
        let inbound = Inbound {
            invocation: Invocation {
                caller: id(caller),
                chat,
                reply_to: reply_to.map(id),
            },
            text: text.to_string(),
        };
        self.router
            .handle(&inbound)
            .await
            .expect("command should produce a reply")
            .text
    }
}
