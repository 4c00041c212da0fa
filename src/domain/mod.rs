//! Domain types and the ports the application layer talks through.
//!
//! Nothing in here performs I/O directly; storage, rosters and moderation are
//! reached through the traits in [`ports`].

pub mod account;
pub mod auth;
pub mod broadcast;
pub mod card;
pub mod ports;
