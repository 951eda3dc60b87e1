//! Centralized application directory paths for herald.
//!
//! Provides a single source of truth for all filesystem paths used by the
//! dispatcher. Uses the [`dirs`] crate for platform-appropriate directory
//! resolution.
//!
//! # Directory Layout
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | App data | `~/Library/Application Support/herald/` | `~/.local/share/herald/` |
//! | Config | `~/Library/Application Support/herald/` | `~/.config/herald/` |
//!
//! # Environment Overrides
//!
//! All paths can be overridden for testing or custom deployments:
//! - `HERALD_DATA_DIR` overrides [`data_dir`]
//! - `HERALD_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Used for persistent campaign data: the delivery ledger database and the
/// default contact list location.
///
/// Resolves to `dirs::data_dir()/herald/` by default. Override with
/// the `HERALD_DATA_DIR` environment variable.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("HERALD_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("herald"))
        .unwrap_or_else(|| PathBuf::from("/tmp/herald-data"))
}

/// Application config directory.
///
/// Used for `config.toml`.
///
/// Resolves to `dirs::config_dir()/herald/` by default. Override with
/// the `HERALD_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("HERALD_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("herald"))
        .unwrap_or_else(|| PathBuf::from("/tmp/herald-config"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default delivery ledger database path (`data_dir()/ledger.db`).
#[must_use]
pub fn default_ledger_path() -> PathBuf {
    data_dir().join("ledger.db")
}

/// Default contact list path (`data_dir()/contacts.csv`).
#[must_use]
pub fn default_contacts_path() -> PathBuf {
    data_dir().join("contacts.csv")
}
