//! Error types for the herald dispatcher.

use crate::ledger::LedgerError;
use crate::transport::TransportError;

/// Top-level error type for the dispatch system.
#[derive(Debug, thiserror::Error)]
pub enum HeraldError {
    /// Configuration error. Fatal before a run begins.
    #[error("config error: {0}")]
    Config(String),

    /// Recipient list error (missing or unreadable contact file).
    #[error("contacts error: {0}")]
    Contacts(String),

    /// Delivery ledger storage error. Aborts an in-progress run.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Message transport error. Recovered per-recipient during a run;
    /// surfaces only from direct transport calls outside the engine.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, HeraldError>;
