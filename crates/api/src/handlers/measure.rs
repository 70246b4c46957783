//! Handlers for measurement submission and job status polling.
//!
//! Submission validates the target, records a queued job and hands a task to
//! the execution queue, then returns immediately. Status is read back by
//! polling; nothing is pushed.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use powerbench_core::error::CoreError;
use powerbench_core::job::{Job, JobError, JobStatus};
use powerbench_core::measurement::MeasurementResult;
use powerbench_core::types::{JobId, Timestamp};
use powerbench_core::validation::validate_target_url;
use serde::{Deserialize, Serialize};

use crate::engine::measurement_task;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Request body for POST /measure.
#[derive(Debug, Deserialize)]
pub struct MeasureRequest {
    pub url: Option<String>,
}

/// Response for POST /measure.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureAccepted {
    pub job_id: JobId,
    pub position: usize,
    pub status: JobStatus,
    pub message: String,
}

/// Response for GET /status/{job_id}.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<MeasurementResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        let position = job.queue_position();
        // Result and error are only exposed in their matching terminal state.
        let result = match job.status {
            JobStatus::Complete => job.result,
            _ => None,
        };
        let error = match job.status {
            JobStatus::Failed => job.error,
            _ => None,
        };
        Self {
            job_id: job.id,
            status: job.status,
            url: job.url,
            position,
            result,
            error,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// POST /measure
///
/// Validates the target URL, creates a queued job and enqueues its
/// measurement. Returns the job id and the number of jobs ahead of it.
pub async fn submit_measurement(
    State(state): State<AppState>,
    body: Result<Json<MeasureRequest>, JsonRejection>,
) -> AppResult<Json<MeasureAccepted>> {
    let Json(input) = body.map_err(|e| CoreError::InvalidInput(e.body_text()))?;
    let raw = input.url.unwrap_or_default();
    let url = validate_target_url(&raw, &state.config.allowed_domains).map_err(CoreError::from)?;

    // Hold the queue tail while the job is recorded so the stored position
    // matches the order tasks reach the dispatcher.
    let reservation = state.queue.reserve().await;
    let position = reservation.position();

    let job = Job::new(raw.trim(), position, Utc::now());
    let job_id = job.id;
    state.store.put(job).await;

    let task = measurement_task(state.store.clone(), state.tool.clone(), job_id, url.clone());
    if reservation.send(task).is_err() {
        state.store.delete(job_id).await;
        return Err(AppError::Unavailable(
            "execution queue is closed".to_string(),
        ));
    }

    tracing::info!(%job_id, url = %url, position, "Measurement queued");

    Ok(Json(MeasureAccepted {
        job_id,
        position,
        status: JobStatus::Queued,
        message: queued_message(position),
    }))
}

fn queued_message(position: usize) -> String {
    match position {
        0 => "Job queued; it will start immediately".to_string(),
        1 => "Job queued; 1 job ahead in the queue".to_string(),
        n => format!("Job queued; {n} jobs ahead in the queue"),
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /status/{job_id}
///
/// Unknown, expired and malformed identifiers all report "not found".
pub async fn get_status(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<JobStatusResponse>> {
    let job_id: JobId = raw_id
        .parse()
        .map_err(|_| CoreError::JobNotFound(raw_id.clone()))?;

    let job = state
        .store
        .get(job_id)
        .await
        .ok_or_else(|| CoreError::JobNotFound(raw_id))?;

    Ok(Json(job.into()))
}
