//! Reset command handler

use std::fs;
use std::io;

use anyhow::{Context, Result};

use readsync_core::Config;

use crate::output::Output;

/// Forget the sync watermark so the next sync fetches everything
///
/// Removes the state file rather than loading it, so a corrupted file can be
/// cleared too. Notes and the token are left alone.
pub fn reset(config: &Config, output: &Output) -> Result<()> {
    let path = config.sync_state_path();

    match fs::remove_file(&path) {
        Ok(()) => output.success("Sync state cleared; the next sync fetches all highlights"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            output.success("Nothing to reset; no sync has completed yet")
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to remove sync state at {:?}", path))
        }
    }

    Ok(())
}
