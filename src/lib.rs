//! Herald: scheduled outbound message dispatcher.
//!
//! Delivers one campaign message to a list of recipients across configured
//! daily time windows, backed by a durable SQLite delivery ledger that
//! guarantees at-most-once delivery per recipient per campaign.
//!
//! # Architecture
//!
//! - **Ledger** ([`ledger`]): durable recipient → status store; the single
//!   source of truth for what has been sent.
//! - **Dispatch engine** ([`dispatch`]): walks the schedule's windows in
//!   order, recomputes the pending pool from the ledger at each window,
//!   waits for the window's target time, and sends with pre-send jitter.
//! - **Transport** ([`transport`]): the channel seam; ships with a
//!   WhatsApp Cloud API adapter.
//! - **Contacts** ([`contacts`]): recipient normalization and CSV loading.
//!
//! The engine never re-attempts a recipient recorded as sent, re-checks
//! the ledger immediately before every send, and survives crashes and
//! restarts mid-campaign: re-running picks up exactly where the ledger
//! says the campaign left off.

pub mod config;
pub mod contacts;
pub mod dispatch;
pub mod error;
pub mod herald_dirs;
pub mod ledger;
pub mod transport;

pub use config::HeraldConfig;
pub use contacts::{Recipient, load_contacts};
pub use dispatch::{DispatchEngine, DispatchEvent, DispatchReport, PacingConfig, Window};
pub use error::{HeraldError, Result};
pub use ledger::{DeliveryLedger, DeliveryStatus, StatusCounts};
pub use transport::{MessagePayload, MessageTransport, UnconfiguredTransport, WhatsAppTransport};
