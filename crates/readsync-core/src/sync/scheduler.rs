//! Periodic auto-sync

use std::future::Future;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::SyncOrchestrator;
use crate::config::{interval_period, MAX_AUTO_SYNC_INTERVAL};

/// When automatic syncs happen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Interval between syncs; `None` or zero disables periodic syncing
    pub period: Option<Duration>,
    /// Sync once right away
    pub sync_on_boot: bool,
}

impl Schedule {
    /// Periods longer than [`MAX_AUTO_SYNC_INTERVAL`] minutes are capped
    pub fn new(period: Option<Duration>, sync_on_boot: bool) -> Self {
        let longest = interval_period(MAX_AUTO_SYNC_INTERVAL).unwrap_or(Duration::MAX);
        Self {
            period: period.filter(|p| !p.is_zero()).map(|p| p.min(longest)),
            sync_on_boot,
        }
    }
}

/// Sync on the given schedule until `shutdown` resolves
///
/// `shutdown` is only checked between runs: a sync that has started, the
/// boot sync included, always runs to completion. Ticks that land while a
/// run is still in flight are skipped, both by the interval and by the
/// orchestrator's own guard. Returns right after the boot sync when no
/// period is configured.
pub async fn run_auto_sync<F>(orchestrator: &SyncOrchestrator, schedule: Schedule, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    if schedule.sync_on_boot {
        debug!("Running boot sync");
        let outcome = orchestrator.sync().await;
        debug!("Boot sync finished: {:?}", outcome);
    }

    let Some(period) = schedule.period.filter(|p| !p.is_zero()) else {
        debug!("Auto sync disabled");
        return;
    };

    info!("Auto sync every {} minute(s)", period.as_secs() / 60);
    let Some(first_tick) = Instant::now().checked_add(period) else {
        warn!("Auto sync period {:?} is out of range, not scheduling", period);
        return;
    };
    let mut ticker = time::interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("Auto sync stopped");
                return;
            }
            _ = ticker.tick() => {
                let outcome = orchestrator.sync().await;
                debug!("Scheduled sync finished: {:?}", outcome);
            }
        }
    }
}
