use coinbot::application::ledger::{LedgerEngine, LedgerSettings};
use coinbot::application::router::{CommandRouter, Inbound};
use coinbot::domain::account::{CARDS_CHECKED, WARNINGS};
use coinbot::domain::auth::{AuthorizationGuard, ChatContext, Invocation};
use coinbot::domain::broadcast::BroadcastBoard;
use coinbot::infrastructure::in_memory::{InMemoryLedgerStore, RecordingModerator, StaticRoster};
use coinbot::interfaces::jsonl::EventRoster;
use std::sync::Arc;

mod common;
use common::{ADMIN, BOT, GROUP, GROUP_ADMIN, coins, harness, id};

#[tokio::test]
async fn test_start_opens_account() {
    let h = harness().await;
    let reply = h.private("7", "/start").await;
    assert!(reply.contains("Your balance: 100"));
    assert!(reply.contains("/transfer <user_id> <coins>"));
    assert_eq!(h.ledger.balance_of(&id("7")).await, 100);
}

#[tokio::test]
async fn test_balance_and_alias() {
    let h = harness().await;
    assert_eq!(h.private("7", "/balance").await, "💰 Your coin balance: 0");
    h.private("7", "/start").await;
    assert_eq!(h.private("7", "/coins").await, "💰 Your coin balance: 100");
}

#[tokio::test]
async fn test_add_requires_admin_regardless_of_arguments() {
    let h = harness().await;
    for text in ["/add 7 10", "/add", "/add 7 -1", "/add 7 ten"] {
        assert_eq!(
            h.private("7", text).await,
            "❌ Only admins can use this command!",
            "{text}"
        );
    }
    assert!(h.ledger.account(&id("7")).await.is_none());
}

#[tokio::test]
async fn test_admin_add_credits_target() {
    let h = harness().await;
    let reply = h.private(ADMIN, "/add 7 25").await;
    assert_eq!(reply, "✅ Added 25 coins to user 7! New balance: 125");
    assert_eq!(h.private(ADMIN, "/add 7").await, "Usage: /add <user_id> <coins>");
}

#[tokio::test]
async fn test_transfer_flow() {
    let h = harness().await;
    h.private("7", "/start").await;
    h.private("8", "/start").await;

    let reply = h.private("7", "/transfer 8 40").await;
    assert_eq!(reply, "✅ Transferred 40 coins to user 8! Your balance: 60");
    assert_eq!(h.ledger.balance_of(&id("8")).await, 140);

    let reply = h.private("7", "/transfer 8 61").await;
    assert!(reply.starts_with("❌ Insufficient coins!"), "{reply}");

    let reply = h.private("7", "/transfer 404 1").await;
    assert_eq!(reply, "❌ Unknown user 404. They need to /start the bot first.");

    assert_eq!(h.private("7", "/transfer 8").await, "Usage: /transfer <user_id> <coins>");
    assert_eq!(h.ledger.balance_of(&id("7")).await, 60);
}

#[tokio::test]
async fn test_card_check_is_metered() {
    let h = harness().await;
    h.private("7", "/start").await;

    let reply = h.private("7", "/chk 4532015112830366|11|2027|816").await;
    assert!(reply.contains("Status: APPROVED (00)"), "{reply}");
    assert!(reply.contains("•••• 0366"));
    assert!(!reply.contains("4532015112830366"));
    assert!(reply.contains("Remaining coins: 99"));

    let reply = h.private("7", ".chk 4532015112830367|11|2027|816").await;
    assert!(reply.contains("Status: DECLINED (01)"), "{reply}");

    let reply = h.private("7", ".chk 4532|11|2027|816").await;
    assert!(reply.contains("Status: INVALID (99)"), "{reply}");
    assert!(reply.contains("Remaining coins: 97"));

    let account = h.ledger.account(&id("7")).await.unwrap();
    assert_eq!(account.counter(CARDS_CHECKED), 3);
}

#[tokio::test]
async fn test_card_check_without_payload_is_free() {
    let h = harness().await;
    h.private("7", "/start").await;
    assert_eq!(h.private("7", "/chk").await, "Usage: /chk number|mm|yy|cvv");
    assert_eq!(h.ledger.balance_of(&id("7")).await, 100);
}

#[tokio::test]
async fn test_card_check_with_no_coins() {
    let h = harness().await;
    h.private("7", "/start").await;
    h.ledger.debit(&id("7"), coins(100)).await.unwrap();

    let reply = h.private("7", "/chk 4532015112830366|11|2027|816").await;
    assert!(reply.starts_with("❌ Insufficient coins!"), "{reply}");
    let account = h.ledger.account(&id("7")).await.unwrap();
    assert_eq!(account.counter(CARDS_CHECKED), 0);
}

#[tokio::test]
async fn test_ban_policy_order() {
    let h = harness().await;

    assert_eq!(
        h.group("7", Some("8"), "/ban").await,
        "❌ Only admins can use this command!"
    );
    assert_eq!(
        h.private(ADMIN, "/ban").await,
        "❌ This command works only in groups!"
    );
    // A resolvable target does not help in a private chat.
    let reply = h
        .send(ADMIN, ChatContext::private(ADMIN), Some("8"), "/ban")
        .await;
    assert_eq!(reply, "❌ This command works only in groups!");
    assert_eq!(
        h.group(ADMIN, None, "/ban").await,
        "⚠️ Reply to a user's message to ban!"
    );
    assert_eq!(h.group(ADMIN, Some(BOT), "/ban").await, "🤖 I can't ban myself!");
    assert_eq!(
        h.group(ADMIN, Some(GROUP_ADMIN), "/ban").await,
        "❌ Cannot ban admins!"
    );
    assert!(h.moderator.bans().await.is_empty());

    assert_eq!(h.group(ADMIN, Some("8"), "/ban").await, "🚫 Banned user 8!");
    assert_eq!(
        h.moderator.bans().await,
        vec![(GROUP.to_string(), id("8"))]
    );
}

#[tokio::test]
async fn test_warn_counts_warnings() {
    let h = harness().await;
    assert_eq!(
        h.group(ADMIN, Some("8"), "/warn").await,
        "⚠️ Warning sent to user 8! (warning #1)"
    );
    assert_eq!(
        h.group(ADMIN, Some("8"), "/warn").await,
        "⚠️ Warning sent to user 8! (warning #2)"
    );
    assert_eq!(h.group(ADMIN, Some(BOT), "/warn").await, "🤖 I can't warn myself!");

    let account = h.ledger.account(&id("8")).await.unwrap();
    assert_eq!(account.counter(WARNINGS), 2);
}

#[tokio::test]
async fn test_broadcast_delivered_once_per_user() {
    let h = harness().await;
    assert_eq!(
        h.private("7", "/broadcast hi").await,
        "❌ Only admins can use this command!"
    );
    assert_eq!(h.private(ADMIN, "/broadcast").await, "Usage: /broadcast <message>");
    assert_eq!(
        h.private(ADMIN, "/broadcast server restart at 5").await,
        "✅ Broadcast sent to all users!"
    );

    let first = h.private("7", "/balance").await;
    assert!(first.starts_with("📢 New broadcasts:\n• server restart at 5\n"), "{first}");
    assert!(first.ends_with("💰 Your coin balance: 0"));

    let second = h.private("7", "/balance").await;
    assert_eq!(second, "💰 Your coin balance: 0");

    let admin = h.private(ADMIN, "/balance").await;
    assert!(!admin.contains("New broadcasts"));
    assert_eq!(h.broadcasts.messages().await.len(), 1);
}

#[tokio::test]
async fn test_unknown_and_non_commands() {
    let h = harness().await;
    assert_eq!(
        h.private("7", "/gen us").await,
        "❓ Unrecognized command. Send /help for the list."
    );

    let inbound = Inbound {
        invocation: Invocation {
            caller: id("7"),
            chat: ChatContext::private("7"),
            reply_to: None,
        },
        text: "just chatting".to_string(),
    };
    assert!(h.router.handle(&inbound).await.is_none());

    for chatter in ["...ok", ".5 coins", ".gen us"] {
        let inbound = Inbound {
            text: chatter.to_string(),
            ..inbound.clone()
        };
        assert!(h.router.handle(&inbound).await.is_none(), "{chatter}");
    }
}

#[tokio::test]
async fn test_persistence_failure_is_reported_and_rolled_back() {
    let h = harness().await;
    h.private("7", "/start").await;
    h.private("8", "/start").await;

    h.store.set_fail_writes(true);
    let reply = h.private("7", "/transfer 8 10").await;
    assert_eq!(
        reply,
        "⚠️ Could not save the change, nothing was applied. Please try again."
    );
    assert_eq!(h.ledger.balance_of(&id("7")).await, 100);
    assert_eq!(h.ledger.balance_of(&id("8")).await, 100);

    h.store.set_fail_writes(false);
    assert!(h.private("7", "/transfer 8 10").await.starts_with("✅"));
}

#[tokio::test]
async fn test_moderation_refused_while_group_roster_is_unknown() {
    let ledger = Arc::new(
        LedgerEngine::open(
            Box::new(InMemoryLedgerStore::new()),
            LedgerSettings::default(),
        )
        .await
        .unwrap(),
    );
    let roster = EventRoster::new();
    let guard = AuthorizationGuard::new([id(ADMIN)], id(BOT), Box::new(roster.clone()));
    let moderator = RecordingModerator::new();
    let router = CommandRouter::new(
        ledger.clone(),
        guard,
        Arc::new(BroadcastBoard::new()),
        Box::new(moderator.clone()),
        coins(1),
    );
    let ban = |target: &str| Inbound {
        invocation: Invocation {
            caller: id(ADMIN),
            chat: ChatContext::group(GROUP),
            reply_to: Some(id(target)),
        },
        text: "/ban".to_string(),
    };

    let reply = router.handle(&ban(GROUP_ADMIN)).await.unwrap();
    assert!(reply.text.contains("don't know this group's admins"), "{}", reply.text);
    assert!(moderator.bans().await.is_empty());

    roster.update(GROUP, vec![GROUP_ADMIN.to_string()]).await;
    let reply = router.handle(&ban(GROUP_ADMIN)).await.unwrap();
    assert_eq!(reply.text, "❌ Cannot ban admins!");
    let reply = router.handle(&ban("8")).await.unwrap();
    assert_eq!(reply.text, "🚫 Banned user 8!");
    assert_eq!(moderator.bans().await, vec![(GROUP.to_string(), id("8"))]);
}

#[tokio::test]
async fn test_broadcasts_from_two_admins_reach_each_other() {
    let store = InMemoryLedgerStore::new();
    let settings = LedgerSettings::default().with_privileged([id("1"), id("2")]);
    let ledger = Arc::new(
        LedgerEngine::open(Box::new(store), settings)
            .await
            .unwrap(),
    );
    let roster = StaticRoster::new();
    let guard = AuthorizationGuard::new([id("1"), id("2")], id(BOT), Box::new(roster));
    let router = CommandRouter::new(
        ledger,
        guard,
        Arc::new(BroadcastBoard::new()),
        Box::new(RecordingModerator::new()),
        coins(1),
    );
    let say = |caller: &str, text: &str| Inbound {
        invocation: Invocation {
            caller: id(caller),
            chat: ChatContext::private(caller),
            reply_to: None,
        },
        text: text.to_string(),
    };

    let reply = router
        .handle(&say("1", "/broadcast from admin one"))
        .await
        .unwrap();
    assert_eq!(reply.text, "✅ Broadcast sent to all users!");

    let reply = router
        .handle(&say("2", "/broadcast from admin two"))
        .await
        .unwrap();
    assert!(reply.text.contains("• from admin one"), "{}", reply.text);
    assert!(reply.text.ends_with("✅ Broadcast sent to all users!"));

    let reply = router.handle(&say("2", "/balance")).await.unwrap();
    assert_eq!(reply.text, "💰 Your coin balance: 0");

    let reply = router.handle(&say("1", "/balance")).await.unwrap();
    assert!(reply.text.contains("• from admin two"), "{}", reply.text);
    assert!(!reply.text.contains("from admin one"));
}
