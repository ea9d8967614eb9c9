use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

use crate::services::session::controller::{SubmitOutcome, SubmitTrigger, Tick};
use crate::services::session::registry::{LiveSession, SessionRegistry};

const TICK: Duration = Duration::from_secs(1);
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// After this many failed timer submissions the session is released to the sweeper.
pub(crate) const MAX_TIMER_SUBMIT_FAILURES: u32 = 5;

/// Drives one live session's clock until it is submitted or the process shuts down.
pub(crate) fn spawn(
    registry: SessionRegistry,
    live: Arc<LiveSession>,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut ticker = interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        let mut failures = 0u32;
        let mut retry_at: Option<Instant> = None;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            match live.tick().await {
                Tick::Running(_) => {}
                Tick::Stopped => break,
                Tick::Expired => {
                    if retry_at.is_some_and(|at| Instant::now() < at) {
                        continue;
                    }

                    match registry.submit(&live, SubmitTrigger::Timer).await {
                        Ok(SubmitOutcome::InFlight) => {}
                        Ok(_) => break,
                        Err(err) => {
                            failures += 1;
                            if !err.is_retryable() || failures >= MAX_TIMER_SUBMIT_FAILURES {
                                tracing::error!(
                                    attempt_id = %live.attempt_id(),
                                    error = %err,
                                    failures,
                                    "Timer submission abandoned; attempt left to the sweeper"
                                );
                                registry.release(&live).await;
                                break;
                            }

                            let backoff = retry_backoff(failures);
                            retry_at = Some(Instant::now() + backoff);
                            tracing::warn!(
                                attempt_id = %live.attempt_id(),
                                error = %err,
                                failures,
                                retry_in_seconds = backoff.as_secs(),
                                "Timer submission failed"
                            );
                        }
                    }
                }
            }
        }

        tracing::debug!(attempt_id = %live.attempt_id(), "Countdown stopped");
    });
}

/// 1s, 2s, 4s ... capped at a minute.
fn retry_backoff(failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(6);
    (TICK * 2u32.pow(exponent)).min(MAX_RETRY_BACKOFF)
}
