//! Recipient model and contact list loading.
//!
//! Recipients are phone numbers in international format. The loader reads a
//! CSV file (first column, header row expected) and normalizes each entry;
//! rows that cannot be normalized are skipped with a warning rather than
//! failing the whole load.

use std::fmt;
use std::path::Path;

use tracing::{info, warn};

use crate::error::{HeraldError, Result};

/// A normalized message recipient.
///
/// Always stores the canonical form: a leading `+` followed by the number
/// with all whitespace and dash separators removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Recipient(String);

impl Recipient {
    /// Normalize a raw contact entry into a recipient.
    ///
    /// Strips whitespace and `-` separators, then requires a leading `+`
    /// with at least one character after it. Returns `None` for entries
    /// that do not look like an international-format number.
    #[must_use]
    pub fn normalize(raw: &str) -> Option<Self> {
        let cleaned: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        if cleaned.len() > 1 && cleaned.starts_with('+') {
            Some(Self(cleaned))
        } else {
            None
        }
    }

    /// The canonical string form (`+<digits>`).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rebuild a recipient from a string the ledger previously stored.
    /// Skips normalization; only for values that came out of [`normalize`].
    ///
    /// [`normalize`]: Recipient::normalize
    pub(crate) fn from_canonical(canonical: String) -> Self {
        Self(canonical)
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Load recipients from a CSV contact file.
///
/// The first line is treated as a header and skipped. Only the first column
/// of each row is read. Blank rows and rows that fail normalization are
/// skipped with a warning. Duplicates are dropped, keeping first-seen order
/// so later candidate selection is deterministic.
///
/// An empty result is legal; a missing or unreadable file is not.
pub fn load_contacts(path: &Path) -> Result<Vec<Recipient>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        HeraldError::Contacts(format!("cannot read contact file {}: {e}", path.display()))
    })?;

    let mut seen = std::collections::HashSet::new();
    let mut contacts = Vec::new();
    for (line_no, line) in raw.lines().enumerate().skip(1) {
        let field = line.split(',').next().unwrap_or("").trim();
        if field.is_empty() {
            if !line.trim().is_empty() {
                warn!(line = line_no + 1, "skipping row with empty contact column");
            }
            continue;
        }
        let Some(recipient) = Recipient::normalize(field) else {
            warn!(line = line_no + 1, entry = field, "skipping malformed contact");
            continue;
        };
        if seen.insert(recipient.clone()) {
            contacts.push(recipient);
        }
    }

    info!(
        count = contacts.len(),
        file = %path.display(),
        "loaded contact list"
    );
    Ok(contacts)
}
