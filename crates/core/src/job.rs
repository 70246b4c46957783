//! Measurement job model and its lifecycle state machine.
//!
//! A job moves `queued -> running -> {complete | failed}` and never back.
//! Each timestamp is set once, by the transition that introduces it, and a
//! terminal job carries exactly one of `result` / `error`.

use std::fmt;

use serde::Serialize;

use crate::error::CoreError;
use crate::measurement::{ExtractError, MeasurementResult, RunnerError};
use crate::types::{JobId, Timestamp};

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    /// Wire name, as used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure detail recorded on a job that ended in `failed`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum JobError {
    /// The tool could not be started, exited non-zero, or timed out.
    ExecutionFailure {
        message: String,
        /// Captured diagnostic stream (stderr).
        details: String,
        elapsed_ms: u64,
        timed_out: bool,
        exit_code: Option<i32>,
    },
    /// The tool exited cleanly but no usable result artifact was found.
    ResultNotFound {
        message: String,
        domain_dir: String,
        latest_folder: Option<String>,
    },
}

impl From<RunnerError> for JobError {
    fn from(err: RunnerError) -> Self {
        let message = err.to_string();
        match err {
            RunnerError::Timeout { elapsed_ms, stderr } => Self::ExecutionFailure {
                message,
                details: stderr,
                elapsed_ms,
                timed_out: true,
                exit_code: None,
            },
            RunnerError::ExitFailure {
                exit_code,
                stderr,
                elapsed_ms,
            } => Self::ExecutionFailure {
                message,
                details: stderr,
                elapsed_ms,
                timed_out: false,
                exit_code,
            },
            RunnerError::Spawn { .. } | RunnerError::Io(_) => Self::ExecutionFailure {
                message,
                details: String::new(),
                elapsed_ms: 0,
                timed_out: false,
                exit_code: None,
            },
        }
    }
}

impl From<ExtractError> for JobError {
    fn from(err: ExtractError) -> Self {
        let message = err.to_string();
        match err {
            ExtractError::NotFound {
                domain_dir,
                latest_folder,
            } => Self::ResultNotFound {
                message,
                domain_dir: domain_dir.display().to_string(),
                latest_folder: latest_folder.map(|p| p.display().to_string()),
            },
            ExtractError::Unreadable {
                domain_dir,
                latest_folder,
                ..
            } => Self::ResultNotFound {
                message,
                domain_dir: domain_dir.display().to_string(),
                latest_folder: Some(latest_folder.display().to_string()),
            },
        }
    }
}

/// One client-requested measurement run.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub url: String,
    /// Jobs queued or running ahead of this one when it was submitted.
    pub position: usize,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub result: Option<MeasurementResult>,
    pub error: Option<JobError>,
}

impl Job {
    /// Create a freshly queued job with a new random identifier.
    pub fn new(url: impl Into<String>, position: usize, now: Timestamp) -> Self {
        Self {
            id: JobId::new_v4(),
            status: JobStatus::Queued,
            url: url.into(),
            position,
            created_at: now,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// `queued -> running`.
    pub fn start(&mut self, now: Timestamp) -> Result<(), CoreError> {
        self.transition(JobStatus::Queued, JobStatus::Running)?;
        self.started_at = Some(now);
        Ok(())
    }

    /// `running -> complete`.
    pub fn complete(&mut self, result: MeasurementResult, now: Timestamp) -> Result<(), CoreError> {
        self.transition(JobStatus::Running, JobStatus::Complete)?;
        self.result = Some(result);
        self.completed_at = Some(now);
        Ok(())
    }

    /// `running -> failed`.
    pub fn fail(&mut self, error: JobError, now: Timestamp) -> Result<(), CoreError> {
        self.transition(JobStatus::Running, JobStatus::Failed)?;
        self.error = Some(error);
        self.completed_at = Some(now);
        Ok(())
    }

    /// Position is only meaningful while the job is still waiting.
    pub fn queue_position(&self) -> Option<usize> {
        (self.status == JobStatus::Queued).then_some(self.position)
    }

    fn transition(&mut self, expected: JobStatus, next: JobStatus) -> Result<(), CoreError> {
        if self.status != expected {
            return Err(CoreError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
