//! Configuration types for the herald dispatcher.
//!
//! Loaded from a TOML file. Every section has defaults, so a partial (or
//! absent) file still yields a usable configuration; `load_or_init` writes
//! the default file on first run so operators have something to edit.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::dispatch::{PacingConfig, Window};
use crate::error::{HeraldError, Result};
use crate::herald_dirs;
use crate::transport::MessagePayload;

/// Top-level configuration for a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeraldConfig {
    /// The campaign message.
    pub message: MessageConfig,
    /// Dispatch windows, processed in file order.
    pub schedule: Vec<Window>,
    /// Contact list source.
    pub contacts: ContactsConfig,
    /// Delivery ledger storage.
    pub ledger: LedgerConfig,
    /// Pacing knobs for the run loop.
    pub dispatch: DispatchConfig,
    /// WhatsApp Cloud API credentials. Absent means no live transport;
    /// dry runs still work.
    pub whatsapp: Option<WhatsAppConfig>,
}

impl Default for HeraldConfig {
    fn default() -> Self {
        Self {
            message: MessageConfig::default(),
            schedule: default_schedule(),
            contacts: ContactsConfig::default(),
            ledger: LedgerConfig::default(),
            dispatch: DispatchConfig::default(),
            whatsapp: None,
        }
    }
}

/// Three daily windows of 30 recipients each.
fn default_schedule() -> Vec<Window> {
    ["09:00", "12:00", "20:00"]
        .iter()
        .filter_map(|t| t.parse().ok())
        .map(|send_at| Window {
            send_at,
            capacity: 30,
        })
        .collect()
}

/// The message every recipient receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageConfig {
    /// Message text (or caption when media is attached).
    pub text: String,
    /// Optional hosted media link (https) sent alongside the text.
    pub media_link: Option<String>,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            text: "Hello World".to_owned(),
            media_link: None,
        }
    }
}

/// Contact list source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactsConfig {
    /// CSV file with recipients in the first column.
    pub file: PathBuf,
}

impl Default for ContactsConfig {
    fn default() -> Self {
        Self {
            file: herald_dirs::default_contacts_path(),
        }
    }
}

/// Delivery ledger storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// SQLite database path. One file per campaign.
    pub database_path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_path: herald_dirs::default_ledger_path(),
        }
    }
}

/// Pacing configuration for the dispatch loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// How often the wait loop re-checks the clock, in seconds.
    pub poll_interval_secs: u64,
    /// Lower bound of the random pre-send jitter, in seconds.
    pub jitter_min_secs: u64,
    /// Upper bound (inclusive) of the random pre-send jitter, in seconds.
    pub jitter_max_secs: u64,
    /// Pause between consecutive recipients, in seconds.
    pub pause_between_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            jitter_min_secs: 2,
            jitter_max_secs: 10,
            pause_between_secs: 1,
        }
    }
}

/// WhatsApp Business Cloud API credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Graph API access token.
    pub access_token: String,
    /// The business phone number id messages are sent from.
    pub phone_number_id: String,
    /// Graph API base URL. Overridable for tests.
    pub api_base: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            phone_number_id: String::new(),
            api_base: crate::transport::whatsapp::DEFAULT_API_BASE.to_owned(),
        }
    }
}

impl HeraldConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HeraldError::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| HeraldError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot
    /// be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| HeraldError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path (`config_dir()/config.toml`).
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        herald_dirs::config_file()
    }

    /// Load the config file at the default path, writing a default file
    /// first if none exists so the operator has a template to edit.
    pub fn load_or_init() -> Result<Self> {
        let path = Self::default_config_path();
        if !path.exists() {
            let config = Self::default();
            config.save_to_file(&path)?;
            tracing::info!(path = %path.display(), "wrote default configuration");
            return Ok(config);
        }
        Self::from_file(&path)
    }

    /// Validate the configuration before a run.
    ///
    /// # Errors
    ///
    /// Returns `HeraldError::Config` for any condition that would make a
    /// run meaningless or unsafe: empty message text, empty schedule, an
    /// inverted jitter range, or a non-http(s) media link.
    pub fn validate(&self) -> Result<()> {
        if self.message.text.trim().is_empty() {
            return Err(HeraldError::Config("message text is empty".to_owned()));
        }
        if self.schedule.is_empty() {
            return Err(HeraldError::Config(
                "schedule has no windows; nothing would ever be sent".to_owned(),
            ));
        }
        if self.dispatch.jitter_min_secs > self.dispatch.jitter_max_secs {
            return Err(HeraldError::Config(format!(
                "jitter_min_secs ({}) exceeds jitter_max_secs ({})",
                self.dispatch.jitter_min_secs, self.dispatch.jitter_max_secs
            )));
        }
        if self.dispatch.poll_interval_secs == 0 {
            return Err(HeraldError::Config(
                "poll_interval_secs must be at least 1; a zero interval would spin \
                 while waiting for a window"
                    .to_owned(),
            ));
        }
        if let Some(link) = &self.message.media_link {
            if !link.starts_with("https://") && !link.starts_with("http://") {
                return Err(HeraldError::Config(format!(
                    "media_link must be an http(s) URL: {link}"
                )));
            }
        }
        Ok(())
    }

    /// The campaign payload handed to the transport for every recipient.
    #[must_use]
    pub fn payload(&self) -> MessagePayload {
        MessagePayload {
            text: self.message.text.clone(),
            media: self.message.media_link.clone(),
        }
    }

    /// Engine pacing built from the dispatch section.
    #[must_use]
    pub fn pacing(&self) -> PacingConfig {
        PacingConfig {
            poll_interval: std::time::Duration::from_secs(self.dispatch.poll_interval_secs),
            jitter_min_secs: self.dispatch.jitter_min_secs,
            jitter_max_secs: self.dispatch.jitter_max_secs,
            pause_between: std::time::Duration::from_secs(self.dispatch.pause_between_secs),
        }
    }
}
