//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/readsync/config.toml)
//! 3. Environment variables (READSYNC_* prefix)
//!
//! Environment variables take precedence over config file values.
//! The sync watermark is not part of the config file, see [`crate::watermark`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix
const ENV_PREFIX: &str = "READSYNC";

/// Default remote service
pub const DEFAULT_API_URL: &str = "https://readwise.io";

/// Default request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT: u64 = 30;

/// Longest auto-sync interval in minutes (one year)
pub const MAX_AUTO_SYNC_INTERVAL: u64 = 525_600;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for internal state (token, watermark)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Root of the note vault that highlight notes are written into
    #[serde(default = "default_vault_dir")]
    pub vault_dir: PathBuf,

    /// Base URL of the highlight export API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Per-request timeout in seconds (0 uses the transport default)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Run a sync as soon as the watcher starts
    #[serde(default)]
    pub sync_on_boot: bool,

    /// Minutes between background syncs (0 disables)
    #[serde(default)]
    pub auto_sync_interval: u64,

    /// Suppress informational notifications (errors are always shown)
    #[serde(default)]
    pub disable_notifications: bool,

    /// Fetch the full history on the very first sync
    #[serde(default = "default_true")]
    pub sync_all_highlights_on_first_sync: bool,

    /// Header template file, relative to the vault (empty = built-in)
    #[serde(default)]
    pub header_template_path: String,

    /// Per-highlight template file, relative to the vault (empty = built-in)
    #[serde(default)]
    pub highlight_template_path: String,

    /// Folder inside the vault that receives the notes (empty = vault root)
    #[serde(default)]
    pub highlight_storage_path: String,

    /// Log file path (logs go to stderr when unset)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            vault_dir: default_vault_dir(),
            api_url: default_api_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT,
            sync_on_boot: false,
            auto_sync_interval: 0,
            disable_notifications: false,
            sync_all_highlights_on_first_sync: true,
            header_template_path: String::new(),
            highlight_template_path: String::new(),
            highlight_storage_path: String::new(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (READSYNC_DATA_DIR, READSYNC_VAULT_DIR, ...)
    /// 2. Config file (~/.config/readsync/config.toml or READSYNC_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit path from the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load only what the file says, without env overrides
    ///
    /// For editing the file in place. Defaults are used if it doesn't exist.
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_VAULT_DIR", ENV_PREFIX)) {
            self.vault_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_API_URL", ENV_PREFIX)) {
            self.api_url = if val.is_empty() {
                default_api_url()
            } else {
                val
            };
        }

        if let Ok(val) = std::env::var(format!("{}_AUTO_SYNC_INTERVAL", ENV_PREFIX)) {
            if let Ok(minutes) = val.parse() {
                self.auto_sync_interval = minutes;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_DISABLE_NOTIFICATIONS", ENV_PREFIX)) {
            self.disable_notifications = parse_bool(&val);
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with READSYNC_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("readsync")
            .join("config.toml")
    }

    /// Get the path to the stored API token
    pub fn token_path(&self) -> PathBuf {
        self.data_dir.join("token")
    }

    /// Get the path to the persisted watermark
    pub fn sync_state_path(&self) -> PathBuf {
        self.data_dir.join("sync_state.json")
    }

    /// Request timeout, `None` when the transport default should apply
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    /// Background sync interval, `None` when auto-sync is disabled
    pub fn auto_sync_period(&self) -> Option<Duration> {
        interval_period(self.auto_sync_interval)
    }

    /// Settings consumed by the sync orchestrator
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            vault_dir: self.vault_dir.clone(),
            header_template_path: self.header_template_path.clone(),
            highlight_template_path: self.highlight_template_path.clone(),
            highlight_storage_path: self.highlight_storage_path.clone(),
            disable_notifications: self.disable_notifications,
            sync_all_highlights_on_first_sync: self.sync_all_highlights_on_first_sync,
        }
    }
}

/// The slice of configuration a sync run reads
#[derive(Debug, Clone, Default)]
pub struct SyncSettings {
    pub vault_dir: PathBuf,
    pub header_template_path: String,
    pub highlight_template_path: String,
    pub highlight_storage_path: String,
    pub disable_notifications: bool,
    pub sync_all_highlights_on_first_sync: bool,
}

impl SyncSettings {
    /// Resolve a template path relative to the vault, `None` for the built-in template
    pub fn resolve_template(&self, path: &str) -> Option<PathBuf> {
        let path = path.trim();
        if path.is_empty() {
            return None;
        }
        let path = Path::new(path);
        if path.is_absolute() {
            Some(path.to_path_buf())
        } else {
            Some(self.vault_dir.join(path))
        }
    }
}

/// Convert an interval in minutes to a period
///
/// Zero disables auto-sync. Values above [`MAX_AUTO_SYNC_INTERVAL`] are capped.
pub fn interval_period(minutes: u64) -> Option<Duration> {
    (minutes > 0).then(|| Duration::from_secs(minutes.min(MAX_AUTO_SYNC_INTERVAL) * 60))
}

fn parse_bool(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

fn default_true() -> bool {
    true
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("readsync")
}

/// Get the default vault directory
fn default_vault_dir() -> PathBuf {
    dirs::document_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("readsync")
}
