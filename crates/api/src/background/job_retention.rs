//! Periodic expiry of job records.
//!
//! Jobs are volatile and kept for a fixed window after creation, whatever
//! their status. This task sweeps the store on a fixed interval using
//! `tokio::time::interval`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use powerbench_core::types::Timestamp;
use powerbench_store::JobStore;
use tokio_util::sync::CancellationToken;

/// Run the job retention loop until `cancel` is triggered.
///
/// Every `interval`, deletes jobs created more than `retention` ago.
pub async fn run(
    store: Arc<dyn JobStore>,
    retention: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        retention_secs = retention.as_secs(),
        interval_secs = interval.as_secs(),
        "Job retention task started"
    );

    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately; nothing can be expired yet.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job retention task stopping");
                break;
            }
            _ = ticker.tick() => {
                let deleted = purge_expired(store.as_ref(), retention, Utc::now()).await;
                if deleted > 0 {
                    tracing::info!(deleted, "Job retention: purged expired jobs");
                } else {
                    tracing::debug!("Job retention: no jobs to purge");
                }
            }
        }
    }
}

/// Delete every job created more than `retention` before `now`.
pub async fn purge_expired(store: &dyn JobStore, retention: Duration, now: Timestamp) -> usize {
    let retention = match chrono::Duration::from_std(retention) {
        Ok(retention) => retention,
        Err(e) => {
            tracing::error!(error = %e, "Job retention: window out of range");
            return 0;
        }
    };
    store.delete_created_before(now - retention).await
}
