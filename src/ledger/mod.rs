//! Durable delivery ledger for herald.
//!
//! Sub-modules:
//! - `types`: Shared types, constants, and helpers.
//! - `schema`: SQLite DDL definitions.
//! - `sqlite`: SQLite-backed `DeliveryLedger`.
//!
//! The ledger records one status per recipient and is the sole source of
//! truth for at-most-once delivery: a recipient recorded as sent is never
//! selected for dispatch again while the record exists.

pub(crate) mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::{DeliveryLedger, LedgerError};
pub use types::{DeliveryRecord, DeliveryStatus, StatusCounts};
