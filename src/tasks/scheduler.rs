use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::tasks::sweeper;

/// Demo results older than this are dropped from the vault.
const DEMO_RESULT_TTL: time::Duration = time::Duration::hours(24);

/// Runs the expired-attempt sweep until `shutdown` flips.
pub(crate) async fn run(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = Duration::from_secs(state.settings().exam().sweep_interval_seconds);
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(interval_seconds = period.as_secs(), "Expired-attempt sweeper started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => run_once(&state).await,
        }
    }

    tracing::info!("Expired-attempt sweeper stopped");
}

async fn run_once(state: &AppState) {
    let now = primitive_now_utc();

    match sweeper::sweep_expired(state.sessions(), now).await {
        Ok(report) if report != sweeper::SweepReport::default() => {
            tracing::info!(
                submitted = report.submitted,
                skipped_live = report.skipped_live,
                already_submitted = report.already_submitted,
                failed = report.failed,
                "Expired-attempt sweep finished"
            );
        }
        Ok(_) => {}
        Err(err) => tracing::error!(error = %err, "Expired-attempt sweep failed"),
    }

    let pruned = state.demo_vault().prune(now - DEMO_RESULT_TTL).await;
    if pruned > 0 {
        tracing::debug!(pruned, "Pruned stale demo results");
    }
}
