use std::collections::HashMap;

use async_trait::async_trait;
use powerbench_core::error::CoreError;
use powerbench_core::job::Job;
use powerbench_core::types::{JobId, Timestamp};
use tokio::sync::RwLock;

use crate::{JobStore, JobUpdate};

/// In-memory job store.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, id: JobId) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    async fn put(&self, job: Job) {
        self.jobs.write().await.insert(job.id, job);
    }

    async fn delete(&self, id: JobId) -> bool {
        self.jobs.write().await.remove(&id).is_some()
    }

    async fn list(&self) -> Vec<Job> {
        self.jobs.read().await.values().cloned().collect()
    }

    async fn update(&self, id: JobId, apply: JobUpdate) -> Result<Job, CoreError> {
        let mut jobs = self.jobs.write().await;
        let stored = jobs.get_mut(&id).ok_or_else(|| CoreError::JobNotFound(id.to_string()))?;

        // Mutate a copy so a rejected transition leaves no trace.
        let mut next = stored.clone();
        apply(&mut next)?;
        *stored = next.clone();
        Ok(next)
    }

    async fn delete_created_before(&self, cutoff: Timestamp) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| job.created_at >= cutoff);
        before - jobs.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
