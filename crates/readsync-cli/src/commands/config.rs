//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use readsync_core::config::MAX_AUTO_SYNC_INTERVAL;
use readsync_core::Config;

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str = "data_dir, vault_dir, api_url, request_timeout_secs, sync_on_boot, \
     auto_sync_interval, disable_notifications, sync_all_highlights_on_first_sync, \
     header_template_path, highlight_template_path, highlight_storage_path, log_file";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            output.json(&serde_json::to_value(&config).context("Failed to serialize config")?);
        }
        OutputFormat::Quiet => {
            println!("{}", config.vault_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:                          {}", config.data_dir.display());
            println!("  vault_dir:                         {}", config.vault_dir.display());
            println!("  api_url:                           {}", config.api_url);
            println!("  request_timeout_secs:              {}", config.request_timeout_secs);
            println!("  sync_on_boot:                      {}", config.sync_on_boot);
            println!("  auto_sync_interval:                {}", config.auto_sync_interval);
            println!("  disable_notifications:             {}", config.disable_notifications);
            println!(
                "  sync_all_highlights_on_first_sync: {}",
                config.sync_all_highlights_on_first_sync
            );
            println!(
                "  header_template_path:              {}",
                or_unset(&config.header_template_path)
            );
            println!(
                "  highlight_template_path:           {}",
                or_unset(&config.highlight_template_path)
            );
            println!(
                "  highlight_storage_path:            {}",
                or_unset(&config.highlight_storage_path)
            );
            println!(
                "  log_file:                          {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);

    // READSYNC_* overrides must not leak into the saved file
    let mut config = Config::load_file(&save_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

/// Apply one `key = value` assignment
fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let unset = value.is_empty() || value == "none";

    match key {
        "data_dir" => config.data_dir = value.into(),
        "vault_dir" => config.vault_dir = value.into(),
        "api_url" => {
            config.api_url = if unset {
                readsync_core::config::DEFAULT_API_URL.to_string()
            } else {
                value.trim_end_matches('/').to_string()
            };
        }
        "request_timeout_secs" => {
            config.request_timeout_secs = value
                .parse()
                .context("Invalid value for request_timeout_secs. Use a number of seconds.")?;
        }
        "sync_on_boot" => {
            config.sync_on_boot = value
                .parse()
                .context("Invalid value for sync_on_boot. Use 'true' or 'false'.")?;
        }
        "auto_sync_interval" => {
            let minutes: u64 = value
                .parse()
                .context("Invalid value for auto_sync_interval. Use a number of minutes.")?;
            if minutes > MAX_AUTO_SYNC_INTERVAL {
                bail!(
                    "auto_sync_interval must be at most {} minutes (one year)",
                    MAX_AUTO_SYNC_INTERVAL
                );
            }
            config.auto_sync_interval = minutes;
        }
        "disable_notifications" => {
            config.disable_notifications = value
                .parse()
                .context("Invalid value for disable_notifications. Use 'true' or 'false'.")?;
        }
        "sync_all_highlights_on_first_sync" => {
            config.sync_all_highlights_on_first_sync = value.parse().context(
                "Invalid value for sync_all_highlights_on_first_sync. Use 'true' or 'false'.",
            )?;
        }
        "header_template_path" => {
            config.header_template_path = if unset { String::new() } else { value.to_string() };
        }
        "highlight_template_path" => {
            config.highlight_template_path = if unset { String::new() } else { value.to_string() };
        }
        "highlight_storage_path" => {
            config.highlight_storage_path = if unset { String::new() } else { value.to_string() };
        }
        "log_file" => {
            config.log_file = if unset { None } else { Some(value.into()) };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }

    Ok(())
}
