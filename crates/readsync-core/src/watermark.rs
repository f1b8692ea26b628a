//! Sync watermark persistence
//!
//! Stores the end of the last successfully synced window between sessions,
//! so the next run only asks the remote for what changed since then.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// On-disk representation
#[derive(Debug, Default, Serialize, Deserialize)]
struct WatermarkFile {
    last_update: Option<DateTime<Utc>>,
}

/// The `lastUpdate` timestamp of the sync engine
#[derive(Debug, Default)]
pub struct Watermark {
    last_update: Option<DateTime<Utc>>,
    /// Path to persist state
    path: Option<PathBuf>,
}

impl Watermark {
    /// Create a watermark that lives in memory only
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a watermark that persists to disk
    pub fn with_path(path: PathBuf) -> Result<Self> {
        let mut watermark = Self {
            last_update: None,
            path: Some(path.clone()),
        };

        if path.exists() {
            watermark.load()?;
        }

        Ok(watermark)
    }

    /// End of the last fully synced window, `None` before the first sync
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    /// Move the watermark forward
    ///
    /// Never moves backwards; returns whether the value changed.
    pub fn advance(&mut self, to: DateTime<Utc>) -> bool {
        match self.last_update {
            Some(current) if current >= to => false,
            _ => {
                self.last_update = Some(to);
                true
            }
        }
    }

    /// Forget the watermark so the next sync fetches everything
    pub fn reset(&mut self) {
        self.last_update = None;
    }

    /// Save state to disk
    pub fn save(&self) -> Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };

        let data = WatermarkFile {
            last_update: self.last_update,
        };
        let json = serde_json::to_string_pretty(&data)?;

        crate::storage::atomic_write(path, json.as_bytes())
            .with_context(|| format!("Failed to save sync state to {:?}", path))?;
        Ok(())
    }

    /// Load state from disk
    fn load(&mut self) -> Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };

        let json = fs::read_to_string(path).context("Failed to read sync state")?;
        let data: WatermarkFile = serde_json::from_str(&json)
            .with_context(|| format!("Sync state at {:?} is corrupted", path))?;
        self.last_update = data.last_update;

        Ok(())
    }
}
