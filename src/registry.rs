//! In-memory registry of conversions that are currently rendering.

use crate::job::ConversionJob;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Point-in-time view of one active job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub id: String,
    pub duration_ms: u64,
    pub pid: String,
}

/// Tracks active conversion jobs for stats and health reporting.
///
/// The lock guards only map mutation and copying; it is never held while a
/// document renders. Each registry is an ordinary value, so tests and
/// embedders can run several side by side.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, ConversionJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fresh job and returns a guard that unregisters it on drop.
    pub fn register(self: &Arc<Self>) -> JobGuard {
        let job = ConversionJob::new();
        self.insert(job.clone());
        JobGuard {
            registry: Arc::clone(self),
            job,
        }
    }

    pub fn insert(&self, job: ConversionJob) {
        let id = job.id.clone();
        let started_at = job.started_at;
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        jobs.insert(id.clone(), job);
        debug!(job_id = %id, %started_at, active = jobs.len(), "Registered job");
    }

    /// Removes a job. Returns `false` when the id was not registered.
    pub fn unregister(&self, id: &str) -> bool {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let removed = jobs.remove(id).is_some();
        debug!(job_id = %id, active = jobs.len(), "Unregistered job");
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the id and elapsed time of every active job.
    pub fn snapshot(&self) -> Vec<JobSnapshot> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        let mut snapshot: Vec<JobSnapshot> = jobs
            .values()
            .map(|job| JobSnapshot {
                id: job.id.clone(),
                duration_ms: u64::try_from(job.elapsed().as_millis()).unwrap_or(u64::MAX),
                pid: job.display_pid(),
            })
            .collect();
        drop(jobs);
        snapshot.sort_by(|a, b| b.duration_ms.cmp(&a.duration_ms));
        snapshot
    }

    /// Fires the cancellation token of every active job.
    pub fn cancel_all(&self) -> usize {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        for job in jobs.values() {
            job.cancel_token().cancel();
        }
        jobs.len()
    }
}

/// Keeps a job registered for as long as it is alive.
///
/// Dropping the guard also cancels the job, so a request that is abandoned
/// mid-render (client gone, future dropped) stops its renderer too.
#[derive(Debug)]
pub struct JobGuard {
    registry: Arc<JobRegistry>,
    job: ConversionJob,
}

impl JobGuard {
    pub fn id(&self) -> &str {
        &self.job.id
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.job.cancel_token().clone()
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.job.cancel_token().cancel();
        self.registry.unregister(&self.job.id);
    }
}
