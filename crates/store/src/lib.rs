//! Job store: the single source of truth for job status.
//!
//! Components refer to jobs by [`JobId`] only and go through [`JobStore`]
//! for every read and write. Records are volatile; [`MemoryJobStore`] keeps
//! them for the life of the process.

pub mod memory;

use async_trait::async_trait;
use powerbench_core::error::CoreError;
use powerbench_core::job::{Job, JobError};
use powerbench_core::measurement::MeasurementResult;
use powerbench_core::types::{JobId, Timestamp};

pub use memory::MemoryJobStore;

/// A mutation applied to one job under the store's lock.
pub type JobUpdate = Box<dyn FnOnce(&mut Job) -> Result<(), CoreError> + Send>;

/// Storage for job records.
///
/// Lifecycle transitions are provided on top of [`JobStore::update`], which
/// applies a mutation atomically with respect to other store operations.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch a snapshot of a job.
    async fn get(&self, id: JobId) -> Option<Job>;

    /// Insert or replace a job record.
    async fn put(&self, job: Job);

    /// Remove a job. Returns `false` if it did not exist.
    async fn delete(&self, id: JobId) -> bool;

    /// Snapshot of every job, in no particular order.
    async fn list(&self) -> Vec<Job>;

    /// Apply `apply` to the stored job and return the updated snapshot.
    ///
    /// Fails with [`CoreError::JobNotFound`] if the job is gone, or with
    /// whatever `apply` returns; a failed mutation leaves the record as it
    /// was.
    async fn update(&self, id: JobId, apply: JobUpdate) -> Result<Job, CoreError>;

    /// Remove every job created before `cutoff`, whatever its status.
    /// Returns the number removed.
    async fn delete_created_before(&self, cutoff: Timestamp) -> usize;

    /// `queued -> running`.
    async fn mark_running(&self, id: JobId, now: Timestamp) -> Result<Job, CoreError> {
        self.update(id, Box::new(move |job: &mut Job| job.start(now))).await
    }

    /// `running -> complete`.
    async fn complete(
        &self,
        id: JobId,
        result: MeasurementResult,
        now: Timestamp,
    ) -> Result<Job, CoreError> {
        self.update(id, Box::new(move |job: &mut Job| job.complete(result, now)))
            .await
    }

    /// `running -> failed`.
    async fn fail(&self, id: JobId, error: JobError, now: Timestamp) -> Result<Job, CoreError> {
        self.update(id, Box::new(move |job: &mut Job| job.fail(error, now))).await
    }
}
