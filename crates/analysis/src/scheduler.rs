use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracelens_core::error::{Result, TracelensError};
use tracelens_core::query::SweepOutcome;
use tracelens_core::repo::{ComponentRegistry, MetricsStore, ProjectStore};

use crate::aggregate::Aggregator;

/// Triggers a sweep on every tick until the task is aborted.
///
/// Ticks never wait for the previous sweep; a tick that lands while one is
/// still running is turned away by the aggregator's single-flight flag.
pub async fn run_periodic<S>(aggregator: Arc<Aggregator<S>>, every: Duration)
where
    S: ProjectStore + MetricsStore + ComponentRegistry + 'static,
{
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        let aggregator = Arc::clone(&aggregator);
        tokio::task::spawn_blocking(move || {
            if let SweepOutcome::AlreadyRunning = aggregator.sweep() {
                tracing::debug!("scheduled sweep skipped");
            }
        });
    }
}

/// Runs one sweep on the blocking pool and waits for it.
pub async fn sweep_now<S>(aggregator: Arc<Aggregator<S>>) -> Result<SweepOutcome>
where
    S: ProjectStore + MetricsStore + ComponentRegistry + 'static,
{
    tokio::task::spawn_blocking(move || aggregator.sweep())
        .await
        .map_err(|e| TracelensError::Internal(format!("sweep task failed: {e}")))
}
