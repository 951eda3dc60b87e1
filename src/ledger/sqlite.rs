//! SQLite-backed delivery ledger.
//!
//! One database file per campaign. Every write is an UPSERT keyed on the
//! recipient, so the ledger can never hold two rows for the same recipient
//! and re-recording a status is idempotent.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{Connection, params};

use super::schema::{apply_schema, read_schema_version};
use super::types::{DeliveryRecord, DeliveryStatus, StatusCounts, now_epoch_secs};
use crate::contacts::Recipient;

/// SQLite-backed delivery ledger.
///
/// Thread-safe via an internal `Mutex<Connection>`. All access is
/// serialized; WAL mode keeps the file readable by external tools while a
/// run is in progress.
pub struct DeliveryLedger {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl DeliveryLedger {
    /// Open (or create) the ledger database at `path`.
    ///
    /// Creates parent directories and applies the schema if the database
    /// is new.
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| LedgerError::Io(e.to_string()))?;
            }
        }
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory ledger. State is lost on drop.
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Returns the database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current schema version from the database.
    pub fn schema_version(&self) -> Result<Option<u32>, LedgerError> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    /// Record the delivery status for a recipient.
    ///
    /// Inserts the row if the recipient is new, otherwise overwrites the
    /// existing status. Single atomic statement.
    pub fn record_status(
        &self,
        recipient: &Recipient,
        status: DeliveryStatus,
    ) -> Result<(), LedgerError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO deliveries (recipient, status, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(recipient) DO UPDATE SET \
             status = excluded.status, updated_at = excluded.updated_at",
            params![recipient.as_str(), status.as_str(), now_epoch_secs()],
        )?;
        Ok(())
    }

    /// Current status of a recipient, or `None` if the ledger has no row
    /// for it.
    pub fn status_of(&self, recipient: &Recipient) -> Result<Option<DeliveryStatus>, LedgerError> {
        let conn = self.lock()?;
        Self::status_with(&conn, recipient)
    }

    /// Whether the recipient is recorded as sent.
    ///
    /// Absent, pending, and failed rows all answer `false`.
    pub fn is_sent(&self, recipient: &Recipient) -> Result<bool, LedgerError> {
        Ok(self.status_of(recipient)? == Some(DeliveryStatus::Sent))
    }

    /// Filter `candidates` down to those not recorded as sent, preserving
    /// candidate order.
    ///
    /// This is the dispatch pool: recipients that are absent from the
    /// ledger, pending, or failed.
    pub fn pending_or_failed(&self, candidates: &[Recipient]) -> Result<Vec<Recipient>, LedgerError> {
        let conn = self.lock()?;
        let mut remaining = Vec::new();
        for candidate in candidates {
            if Self::status_with(&conn, candidate)? != Some(DeliveryStatus::Sent) {
                remaining.push(candidate.clone());
            }
        }
        Ok(remaining)
    }

    /// Delete every ledger row. Returns the number of rows removed.
    pub fn reset_all(&self) -> Result<usize, LedgerError> {
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM deliveries", [])?;
        Ok(rows)
    }

    /// Re-arm failed recipients: `failed` rows become `pending`. Rows in
    /// any other state are untouched. Returns the number of rows changed.
    pub fn reset_failed(&self) -> Result<usize, LedgerError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE deliveries SET status = 'pending', updated_at = ?1 WHERE status = 'failed'",
            params![now_epoch_secs()],
        )?;
        Ok(rows)
    }

    /// Per-status row counts.
    pub fn counts(&self) -> Result<StatusCounts, LedgerError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM deliveries GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = StatusCounts::default();
        for r in rows {
            let (status, n) = r?;
            let n = usize::try_from(n).unwrap_or(0);
            match DeliveryStatus::parse(&status) {
                DeliveryStatus::Pending => counts.pending += n,
                DeliveryStatus::Sent => counts.sent += n,
                DeliveryStatus::Failed => counts.failed += n,
            }
        }
        Ok(counts)
    }

    /// Full ledger contents, ordered by recipient.
    pub fn snapshot(&self) -> Result<Vec<DeliveryRecord>, LedgerError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT recipient, status, updated_at FROM deliveries ORDER BY recipient",
        )?;
        let rows = stmt.query_map([], row_to_record)?;

        let mut records = Vec::new();
        for r in rows {
            records.push(r?);
        }
        Ok(records)
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    /// Acquire the connection mutex.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, LedgerError> {
        self.conn.lock().map_err(|e| LedgerError::Lock(e.to_string()))
    }

    /// Status lookup on an already-locked connection.
    fn status_with(
        conn: &Connection,
        recipient: &Recipient,
    ) -> Result<Option<DeliveryStatus>, LedgerError> {
        let mut stmt = conn.prepare("SELECT status FROM deliveries WHERE recipient = ?1")?;
        let mut rows = stmt.query(params![recipient.as_str()])?;
        match rows.next()? {
            Some(row) => {
                let val: String = row.get(0)?;
                Ok(Some(DeliveryStatus::parse(&val)))
            }
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from the SQLite ledger backend.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("lock poisoned: {0}")]
    Lock(String),
}

// ---------------------------------------------------------------------------
// Row conversion helpers
// ---------------------------------------------------------------------------

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeliveryRecord> {
    let recipient: String = row.get(0)?;
    let status: String = row.get(1)?;
    Ok(DeliveryRecord {
        recipient: Recipient::from_canonical(recipient),
        status: DeliveryStatus::parse(&status),
        updated_at: row.get(2)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient(s: &str) -> Recipient {
        Recipient::normalize(s).expect("valid recipient")
    }

    fn test_ledger() -> (tempfile::TempDir, DeliveryLedger) {
        let dir = tempfile::TempDir::new().expect("create temp dir");
        let ledger = DeliveryLedger::open(&dir.path().join("ledger.db")).expect("open ledger");
        (dir, ledger)
    }

    #[test]
    fn open_creates_schema() {
        let (_dir, ledger) = test_ledger();
        let version = ledger.schema_version().expect("schema_version");
        assert_eq!(version, Some(super::super::types::CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn open_creates_missing_parent_dirs() {
        let dir = tempfile::TempDir::new().expect("create temp dir");
        let nested = dir.path().join("a").join("b").join("ledger.db");
        let ledger = DeliveryLedger::open(&nested).expect("open nested ledger");
        assert_eq!(ledger.path(), nested);
    }

    #[test]
    fn status_of_unknown_recipient_is_none() {
        let (_dir, ledger) = test_ledger();
        let status = ledger.status_of(&recipient("+15550100")).expect("status_of");
        assert_eq!(status, None);
    }

    #[test]
    fn record_status_inserts_then_overwrites() {
        let (_dir, ledger) = test_ledger();
        let r = recipient("+15550100");

        ledger
            .record_status(&r, DeliveryStatus::Pending)
            .expect("insert");
        assert_eq!(
            ledger.status_of(&r).expect("read"),
            Some(DeliveryStatus::Pending)
        );

        ledger.record_status(&r, DeliveryStatus::Sent).expect("update");
        assert_eq!(
            ledger.status_of(&r).expect("read"),
            Some(DeliveryStatus::Sent)
        );

        // Still exactly one row after the overwrite.
        let records = ledger.snapshot().expect("snapshot");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].recipient, r);
    }

    #[test]
    fn is_sent_only_for_sent_rows() {
        let (_dir, ledger) = test_ledger();
        let sent = recipient("+15550100");
        let failed = recipient("+15550101");
        let absent = recipient("+15550102");

        ledger.record_status(&sent, DeliveryStatus::Sent).expect("record");
        ledger
            .record_status(&failed, DeliveryStatus::Failed)
            .expect("record");

        assert!(ledger.is_sent(&sent).expect("is_sent"));
        assert!(!ledger.is_sent(&failed).expect("is_sent"));
        assert!(!ledger.is_sent(&absent).expect("is_sent"));
    }

    #[test]
    fn pending_or_failed_preserves_candidate_order() {
        let (_dir, ledger) = test_ledger();
        let a = recipient("+15550100");
        let b = recipient("+15550101");
        let c = recipient("+15550102");

        ledger.record_status(&b, DeliveryStatus::Sent).expect("record");
        ledger.record_status(&c, DeliveryStatus::Failed).expect("record");

        let pool = ledger
            .pending_or_failed(&[c.clone(), a.clone(), b.clone()])
            .expect("pool");
        assert_eq!(pool, vec![c, a]);
    }

    #[test]
    fn pending_or_failed_ignores_noncandidates() {
        let (_dir, ledger) = test_ledger();
        let a = recipient("+15550100");
        let stranger = recipient("+15559999");
        ledger
            .record_status(&stranger, DeliveryStatus::Pending)
            .expect("record");

        let pool = ledger.pending_or_failed(std::slice::from_ref(&a)).expect("pool");
        assert_eq!(pool, vec![a]);
    }

    #[test]
    fn reset_all_clears_every_row() {
        let (_dir, ledger) = test_ledger();
        ledger
            .record_status(&recipient("+15550100"), DeliveryStatus::Sent)
            .expect("record");
        ledger
            .record_status(&recipient("+15550101"), DeliveryStatus::Failed)
            .expect("record");

        let removed = ledger.reset_all().expect("reset_all");
        assert_eq!(removed, 2);
        assert!(ledger.snapshot().expect("snapshot").is_empty());
        assert_eq!(
            ledger.status_of(&recipient("+15550100")).expect("status"),
            None
        );
    }

    #[test]
    fn reset_failed_touches_only_failed_rows() {
        let (_dir, ledger) = test_ledger();
        let sent = recipient("+15550100");
        let failed = recipient("+15550101");
        let pending = recipient("+15550102");

        ledger.record_status(&sent, DeliveryStatus::Sent).expect("record");
        ledger
            .record_status(&failed, DeliveryStatus::Failed)
            .expect("record");
        ledger
            .record_status(&pending, DeliveryStatus::Pending)
            .expect("record");

        let changed = ledger.reset_failed().expect("reset_failed");
        assert_eq!(changed, 1);
        assert_eq!(
            ledger.status_of(&failed).expect("status"),
            Some(DeliveryStatus::Pending)
        );
        assert_eq!(
            ledger.status_of(&sent).expect("status"),
            Some(DeliveryStatus::Sent)
        );
        assert_eq!(
            ledger.status_of(&pending).expect("status"),
            Some(DeliveryStatus::Pending)
        );
    }

    #[test]
    fn counts_group_by_status() {
        let (_dir, ledger) = test_ledger();
        ledger
            .record_status(&recipient("+15550100"), DeliveryStatus::Sent)
            .expect("record");
        ledger
            .record_status(&recipient("+15550101"), DeliveryStatus::Sent)
            .expect("record");
        ledger
            .record_status(&recipient("+15550102"), DeliveryStatus::Failed)
            .expect("record");

        let counts = ledger.counts().expect("counts");
        assert_eq!(counts.sent, 2);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.pending, 0);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn ledger_survives_reopen() {
        let dir = tempfile::TempDir::new().expect("create temp dir");
        let path = dir.path().join("ledger.db");
        let r = recipient("+15550100");

        {
            let ledger = DeliveryLedger::open(&path).expect("open");
            ledger.record_status(&r, DeliveryStatus::Sent).expect("record");
        }

        let reopened = DeliveryLedger::open(&path).expect("reopen");
        assert!(reopened.is_sent(&r).expect("is_sent"));
    }

    #[test]
    fn in_memory_ledger_starts_empty() {
        let ledger = DeliveryLedger::open_in_memory().expect("open in-memory");
        assert!(ledger.snapshot().expect("snapshot").is_empty());
    }
}
