//! Edges of the system: chat transport, operator console and exports.

pub mod console;
pub mod csv;
pub mod jsonl;
