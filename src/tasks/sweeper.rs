//! Retention sweeper: reclaims old task records and any files they still hold.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::tasks::registry::TaskRegistry;
use crate::tasks::runner::remove_input;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Remove every record older than `retention` at `now`, deleting its input
/// file first if one is still referenced. Returns the number of records removed.
///
/// Status is ignored: a task stuck in `processing` is reclaimed on the same
/// schedule as a finished one. A worker still running for an evicted task
/// gets `NotFound` on its next update and drops its result.
pub async fn sweep_expired(registry: &TaskRegistry, retention: Duration, now: DateTime<Utc>) -> usize {
    let expired: Vec<_> = registry
        .list()
        .await
        .into_iter()
        .filter(|record| record.is_expired(now, retention))
        .collect();

    let mut removed = 0;
    for record in expired {
        if let Some(path) = record.input_path.as_deref() {
            remove_input(path).await;
        }
        if registry.remove(record.id).await.is_some() {
            removed += 1;
            debug!(task_id = %record.id, status = %record.status, "Task evicted");
        }
    }

    if removed > 0 {
        info!(count = removed, "Swept expired tasks");
    }

    removed
}

/// Spawn the perpetual sweeper. It first runs one `interval` after startup.
/// A zero `interval` is raised to one millisecond.
pub fn spawn_retention_sweeper(
    registry: Arc<TaskRegistry>,
    retention: Duration,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(MIN_SWEEP_INTERVAL));
        // Skip immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            sweep_expired(&registry, retention, Utc::now()).await;
        }
    })
}
