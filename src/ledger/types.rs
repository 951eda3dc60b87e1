//! Shared types for the delivery ledger.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::contacts::Recipient;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Delivery status
// ---------------------------------------------------------------------------

/// Delivery state of a single recipient within a campaign.
///
/// `Sent` is terminal: the engine never dispatches to a recipient recorded
/// as sent. `Failed` is terminal for the run that recorded it; a later run
/// (or an explicit reset) may attempt the recipient again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    /// Stable string form used in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    /// Parse the database string form. Unknown values fall back to
    /// `Pending`, which re-queues the row rather than losing it.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "sent" => Self::Sent,
            "failed" => Self::Failed,
            _ => Self::Pending, // safe fallback
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Records and counts
// ---------------------------------------------------------------------------

/// One ledger row: a recipient and its current delivery state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub recipient: Recipient,
    pub status: DeliveryStatus,
    /// Unix epoch seconds of the last status write.
    pub updated_at: u64,
}

/// Per-status row counts, for the status report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub sent: usize,
    pub failed: usize,
}

impl StatusCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.pending + self.sent + self.failed
    }
}

pub(crate) fn now_epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_str_round_trip() {
        for status in [
            DeliveryStatus::Pending,
            DeliveryStatus::Sent,
            DeliveryStatus::Failed,
        ] {
            assert_eq!(DeliveryStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn unknown_status_falls_back_to_pending() {
        assert_eq!(DeliveryStatus::parse("delivered"), DeliveryStatus::Pending);
        assert_eq!(DeliveryStatus::parse(""), DeliveryStatus::Pending);
    }

    #[test]
    fn status_serde_uses_snake_case() {
        let json = serde_json::to_string(&DeliveryStatus::Sent).unwrap();
        assert_eq!(json, "\"sent\"");
        let back: DeliveryStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(back, DeliveryStatus::Failed);
    }

    #[test]
    fn counts_total_sums_all_states() {
        let counts = StatusCounts {
            pending: 3,
            sent: 5,
            failed: 2,
        };
        assert_eq!(counts.total(), 10);
    }
}
