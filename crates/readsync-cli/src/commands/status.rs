//! Status command handler

use anyhow::Result;

use readsync_core::Config;

use crate::context::{credential_store, load_watermark};
use crate::output::{format_time, Output, OutputFormat};

/// Show sync status information
pub fn show(config: &Config, token: Option<&str>, output: &Output) -> Result<()> {
    let credential_configured = credential_store(config, token).try_get()?.is_some();
    let last_update = load_watermark(config)?.last_update();
    let storage_dir = config.vault_dir.join(&config.highlight_storage_path);

    match output.format {
        OutputFormat::Json => output.json(&serde_json::json!({
            "token_configured": credential_configured,
            "last_sync": last_update,
            "vault_dir": config.vault_dir,
            "storage_dir": storage_dir,
            "api_url": config.api_url,
            "auto_sync_interval": config.auto_sync_interval,
            "sync_state": config.sync_state_path(),
        })),
        OutputFormat::Quiet => {
            println!(
                "{}",
                last_update
                    .map(|ts| ts.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string())
            );
        }
        OutputFormat::Human => {
            println!("readsync Status");
            println!("===============");
            println!();
            println!("Remote:");
            println!("  API:   {}", config.api_url);
            println!(
                "  Token: {}",
                if credential_configured {
                    "configured"
                } else {
                    "not configured (run `readsync auth login`)"
                }
            );
            println!();
            println!("Sync:");
            println!("  Last sync: {}", format_time(last_update));
            println!(
                "  Auto sync: {}",
                match config.auto_sync_interval {
                    0 => "disabled".to_string(),
                    minutes => format!("every {} minute(s)", minutes),
                }
            );
            println!();
            println!("Storage:");
            println!("  Vault: {}", config.vault_dir.display());
            println!("  Notes: {}", storage_dir.display());
            println!("  State: {}", config.sync_state_path().display());
        }
    }

    Ok(())
}
