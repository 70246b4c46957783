//! The dispatched unit of work for one measurement job.
//!
//! The task is the only writer of its job's `running` and terminal states.
//! Every failure is recorded on the job; nothing propagates to the queue.

use std::sync::Arc;

use chrono::Utc;
use powerbench_core::job::JobError;
use powerbench_core::measurement::{extract_result, run_tool, MeasurementResult, ToolConfig};
use powerbench_core::types::JobId;
use powerbench_store::JobStore;
use url::Url;

use super::queue::QueueTask;

/// Box a measurement run for the execution queue.
pub fn measurement_task(
    store: Arc<dyn JobStore>,
    tool: Arc<ToolConfig>,
    job_id: JobId,
    url: Url,
) -> QueueTask {
    Box::pin(async move { run_measurement(store.as_ref(), &tool, job_id, &url).await })
}

/// Run one job: mark it running, invoke the tool, extract the result and
/// record the outcome.
pub async fn run_measurement(store: &dyn JobStore, tool: &ToolConfig, job_id: JobId, url: &Url) {
    if let Err(e) = store.mark_running(job_id, Utc::now()).await {
        tracing::warn!(%job_id, error = %e, "Skipping job that can no longer start");
        return;
    }
    tracing::info!(%job_id, url = %url, "Job started");

    let recorded = match execute(tool, url).await {
        Ok(result) => {
            tracing::info!(
                %job_id,
                execution_time = result.execution_time.as_deref().unwrap_or("-"),
                "Job completed",
            );
            store.complete(job_id, result, Utc::now()).await
        }
        Err(error) => {
            tracing::warn!(%job_id, error = ?error, "Job failed");
            store.fail(job_id, error, Utc::now()).await
        }
    };

    if let Err(e) = recorded {
        tracing::error!(%job_id, error = %e, "Failed to record job outcome");
    }
}

async fn execute(tool: &ToolConfig, url: &Url) -> Result<MeasurementResult, JobError> {
    let run = run_tool(tool, url.as_str()).await?;
    tracing::debug!(
        elapsed_ms = run.elapsed_ms,
        output_dir = %run.output_dir.display(),
        "Measurement tool finished",
    );
    let result = extract_result(&tool.results_root, url, run.elapsed_ms).await?;
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
