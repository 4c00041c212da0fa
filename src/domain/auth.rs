use super::account::AccountId;
use super::ports::RosterLookupBox;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// The single reason an authorization check stopped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    #[error("only admins can use this command")]
    NotPrivileged,
    #[error("this command works only in groups")]
    NotInGroup,
    #[error("reply to a member's message to target them")]
    NoReplyTarget,
    #[error("the bot cannot target itself")]
    SelfTarget,
    #[error("group admins cannot be targeted")]
    TargetIsPrivileged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContext {
    pub kind: ChatKind,
    pub id: String,
}

impl ChatContext {
    pub fn private(id: impl Into<String>) -> Self {
        Self {
            kind: ChatKind::Private,
            id: id.into(),
        }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self {
            kind: ChatKind::Group,
            id: id.into(),
        }
    }
}

/// Who invoked a command, where, and which earlier message it replies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub caller: AccountId,
    pub chat: ChatContext,
    /// Author of the message being replied to, if any.
    pub reply_to: Option<AccountId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    None,
    Privileged,
    GroupScoped,
}

/// Decides whether an invocation may proceed.
///
/// Privilege comes from a static allow-list. Group-scoped checks additionally
/// consult the live roster of the group, so a member promoted to group admin
/// is protected even if they are not on the allow-list.
pub struct AuthorizationGuard {
    admins: HashSet<AccountId>,
    system_id: AccountId,
    roster: RosterLookupBox,
}

impl AuthorizationGuard {
    pub fn new(
        admins: impl IntoIterator<Item = AccountId>,
        system_id: AccountId,
        roster: RosterLookupBox,
    ) -> Self {
        Self {
            admins: admins.into_iter().collect(),
            system_id,
            roster,
        }
    }

    pub fn check_privileged(&self, caller: &AccountId) -> bool {
        self.admins.contains(caller)
    }

    /// Context checks for moderation commands, in fixed order. Returns the
    /// resolved target on success.
    pub async fn check_group_scoped(&self, invocation: &Invocation) -> Result<AccountId> {
        if invocation.chat.kind != ChatKind::Group {
            return Err(Denial::NotInGroup.into());
        }
        let Some(target) = invocation.reply_to.as_ref() else {
            return Err(Denial::NoReplyTarget.into());
        };
        if *target == self.system_id {
            return Err(Denial::SelfTarget.into());
        }
        let group_admins = self.roster.privileged_members(&invocation.chat.id).await?;
        if group_admins.contains(target) {
            return Err(Denial::TargetIsPrivileged.into());
        }
        Ok(target.clone())
    }

    /// Evaluates a declared requirement. Group-scoped commands are also
    /// privileged-only, and the privilege check runs first.
    pub async fn authorize(
        &self,
        requirement: Requirement,
        invocation: &Invocation,
    ) -> Result<Option<AccountId>> {
        match requirement {
            Requirement::None => Ok(None),
            Requirement::Privileged => {
                if self.check_privileged(&invocation.caller) {
                    Ok(None)
                } else {
                    tracing::warn!(caller = %invocation.caller, "privileged command refused");
                    Err(Denial::NotPrivileged.into())
                }
            }
            Requirement::GroupScoped => {
                if !self.check_privileged(&invocation.caller) {
                    tracing::warn!(caller = %invocation.caller, "moderation command refused");
                    return Err(Denial::NotPrivileged.into());
                }
                self.check_group_scoped(invocation).await.map(Some)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use crate::infrastructure::in_memory::StaticRoster;

    const BOT: &str = "999";

    fn guard() -> AuthorizationGuard {
        let roster = StaticRoster::new()
            .with_admins("g1", ["50"])
            .with_admins("g2", ["60"]);
        AuthorizationGuard::new(
            [AccountId::from("1")],
            AccountId::from(BOT),
            Box::new(roster),
        )
    }

    fn invocation(caller: &str, chat: ChatContext, reply_to: Option<&str>) -> Invocation {
        Invocation {
            caller: AccountId::from(caller),
            chat,
            reply_to: reply_to.map(AccountId::from),
        }
    }

    fn denial(result: Result<Option<AccountId>>) -> Denial {
        match result {
            Err(BotError::AuthorizationDenied(denial)) => denial,
            other => panic!("expected a denial, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_requirement_always_passes() {
        let guard = guard();
        let inv = invocation("2", ChatContext::private("2"), None);
        assert_eq!(guard.authorize(Requirement::None, &inv).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_non_admin_is_rejected_for_privileged() {
        let guard = guard();
        let inv = invocation("2", ChatContext::group("g1"), Some("3"));
        assert_eq!(
            denial(guard.authorize(Requirement::Privileged, &inv).await),
            Denial::NotPrivileged
        );
        assert_eq!(
            denial(guard.authorize(Requirement::GroupScoped, &inv).await),
            Denial::NotPrivileged
        );
    }

    #[tokio::test]
    async fn test_private_chat_is_rejected_even_with_target() {
        let guard = guard();
        let inv = invocation("1", ChatContext::private("1"), Some("3"));
        assert_eq!(
            denial(guard.authorize(Requirement::GroupScoped, &inv).await),
            Denial::NotInGroup
        );
    }

    #[tokio::test]
    async fn test_missing_reply_target() {
        let guard = guard();
        let inv = invocation("1", ChatContext::group("g1"), None);
        assert_eq!(
            denial(guard.authorize(Requirement::GroupScoped, &inv).await),
            Denial::NoReplyTarget
        );
    }

    #[tokio::test]
    async fn test_bot_cannot_be_targeted() {
        let guard = guard();
        let inv = invocation("1", ChatContext::group("g1"), Some(BOT));
        assert_eq!(
            denial(guard.authorize(Requirement::GroupScoped, &inv).await),
            Denial::SelfTarget
        );
    }

    #[tokio::test]
    async fn test_group_admin_cannot_be_targeted() {
        let guard = guard();
        let inv = invocation("1", ChatContext::group("g1"), Some("50"));
        assert_eq!(
            denial(guard.authorize(Requirement::GroupScoped, &inv).await),
            Denial::TargetIsPrivileged
        );

        // Roster is per group: the same member is fair game elsewhere.
        let inv = invocation("1", ChatContext::group("g2"), Some("50"));
        assert_eq!(
            guard
                .authorize(Requirement::GroupScoped, &inv)
                .await
                .unwrap(),
            Some(AccountId::from("50"))
        );
    }

    #[tokio::test]
    async fn test_unknown_roster_fails_closed() {
        let guard = guard();
        let inv = invocation("1", ChatContext::group("g3"), Some("50"));
        let result = guard.authorize(Requirement::GroupScoped, &inv).await;
        assert!(
            matches!(result, Err(BotError::RosterUnavailable { ref chat_id }) if chat_id == "g3"),
            "{result:?}"
        );
    }

    #[tokio::test]
    async fn test_group_scoped_success_resolves_target() {
        let guard = guard();
        let inv = invocation("1", ChatContext::group("g1"), Some("3"));
        let target = guard.check_group_scoped(&inv).await.unwrap();
        assert_eq!(target, AccountId::from("3"));
    }
}
