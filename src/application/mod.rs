//! Application layer containing the core business logic orchestration.
//!
//! [`ledger::LedgerEngine`] owns the coin ledger and is the only component with
//! mutable shared state. [`router::CommandRouter`] turns chat commands into
//! calls on the engine, the card validator and the moderation port, after the
//! authorization guard has had its say.

pub mod ledger;
pub mod router;
