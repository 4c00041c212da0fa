use crate::domain::auth::Denial;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Malformed command, usage: {usage}")]
    Format { usage: &'static str },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Insufficient funds: have {available}, need {required}")]
    InsufficientFunds { available: u64, required: u64 },
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(#[from] Denial),
    #[error("Unknown account: {id}")]
    UnknownAccount { id: String },
    #[error("Admin roster of chat {chat_id} is not known")]
    RosterUnavailable { chat_id: String },
    #[error("Ledger {path} is in use by another process")]
    LedgerLocked { path: String },
    #[error("Persistence failure: {0}")]
    Persistence(Box<dyn std::error::Error + Send + Sync>),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl BotError {
    /// Only a failed durable write may succeed when retried unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, BotError::Persistence(_))
    }
}

impl From<std::io::Error> for BotError {
    fn from(err: std::io::Error) -> Self {
        BotError::Persistence(Box::new(err))
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::Persistence(Box::new(err))
    }
}

impl From<tempfile::PersistError> for BotError {
    fn from(err: tempfile::PersistError) -> Self {
        BotError::Persistence(Box::new(err.error))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for BotError {
    fn from(err: rocksdb::Error) -> Self {
        BotError::Persistence(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
