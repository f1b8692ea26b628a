//! Watch command handler

use anyhow::{bail, Result};
use tracing::info;

use readsync_core::config::interval_period;
use readsync_core::{run_auto_sync, Config, Schedule};

use crate::console::ConsoleNotifier;
use crate::context::build_orchestrator;
use crate::output::Output;

/// Sync on the configured schedule until interrupted
pub async fn watch(
    config: &Config,
    token: Option<&str>,
    interval: Option<u64>,
    output: &Output,
) -> Result<()> {
    let period = match interval {
        Some(minutes) => interval_period(minutes),
        None => config.auto_sync_period(),
    };
    let schedule = Schedule::new(period, config.sync_on_boot);

    let Some(period) = schedule.period else {
        bail!(
            "Auto sync is disabled. Set an interval with:\n  \
             readsync config set auto_sync_interval 60"
        );
    };

    let notifier = ConsoleNotifier::new(*output).with_states();
    let orchestrator = build_orchestrator(config, token, notifier, output)?;

    output.message(&format!(
        "Watching: syncing every {} minute(s). Press Ctrl-C to stop.",
        period.as_secs() / 60
    ));

    run_auto_sync(&orchestrator, schedule, async {
        // An error here means no signal handler; fall through and stop
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;

    info!("Watch stopped");
    output.message("Stopped.");
    Ok(())
}
