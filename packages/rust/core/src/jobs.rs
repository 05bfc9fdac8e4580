//! Job registry for batch analyses.
//!
//! [`JobStore`] is owned by the orchestrator and shared with pollers. Every
//! mutation happens under one write lock, so a snapshot never shows
//! `completed` out of step with `results`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use bizintel_shared::{BatchJob, BatchOutcome, BizIntelError, JobId, JobStatus, Result};

/// Shared map of job id to job state.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<JobId, BatchJob>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job.
    pub async fn insert(&self, job: BatchJob) {
        self.jobs.write().await.insert(job.id, job);
    }

    /// Current state of a job.
    pub async fn snapshot(&self, id: JobId) -> Result<BatchJob> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(BizIntelError::JobNotFound(id))
    }

    /// Append one outcome and bump the completed count.
    pub async fn record_success(&self, id: JobId, outcome: BatchOutcome) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(BizIntelError::JobNotFound(id))?;
        if job.status.is_finished() || job.completed >= job.total {
            warn!(job = %id, status = %job.status, "ignoring outcome for settled job");
            return Ok(());
        }
        job.results.push(outcome);
        job.completed += 1;
        Ok(())
    }

    /// Sort results by score and mark the job completed.
    pub async fn complete(&self, id: JobId) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(BizIntelError::JobNotFound(id))?;
        if job.status.is_finished() {
            warn!(job = %id, status = %job.status, "job already finished");
            return Ok(());
        }
        // stable: equal scores keep completion order
        job.results.sort_by(|a, b| b.score().cmp(&a.score()));
        job.status = JobStatus::Completed;
        job.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the job failed. Results collected so far are kept.
    pub async fn fail(&self, id: JobId, error: impl Into<String>) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(BizIntelError::JobNotFound(id))?;
        if job.status.is_finished() {
            warn!(job = %id, status = %job.status, "job already finished");
            return Ok(());
        }
        job.status = JobStatus::Failed;
        job.error = Some(error.into());
        job.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Snapshots of every known job, oldest first.
    pub async fn list(&self) -> Vec<BatchJob> {
        let mut jobs: Vec<BatchJob> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|j| j.id.0);
        jobs
    }

    /// Ids of jobs still processing.
    pub async fn outstanding(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| !j.status.is_finished())
            .map(|j| j.id)
            .collect();
        ids.sort_by_key(|id| id.0);
        ids
    }

    /// Drop finished jobs whose `finished_at` is older than `older_than`.
    /// Returns the number of jobs removed.
    pub async fn prune_finished(&self, older_than: Duration) -> usize {
        let Ok(age) = chrono::Duration::from_std(older_than) else {
            return 0;
        };
        let cutoff = Utc::now() - age;
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| match job.finished_at {
            Some(finished) => finished > cutoff,
            None => true,
        });
        let removed = before - jobs.len();
        if removed > 0 {
            debug!(removed, "pruned finished jobs");
        }
        removed
    }
}

// ---------------------------------------------------------------------------
// Task handle
// ---------------------------------------------------------------------------

/// Handle to a submitted job's background worker.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    total: usize,
    task: JoinHandle<()>,
}

impl JobHandle {
    pub(crate) fn new(id: JobId, total: usize, task: JoinHandle<()>) -> Self {
        Self { id, total, task }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the worker to settle the job.
    pub async fn wait(self) -> Result<()> {
        let id = self.id;
        self.task
            .await
            .map_err(|e| BizIntelError::Job(format!("worker for {id} stopped: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for batch workers.
pub trait BatchProgress: Send + Sync {
    /// Called before an entity starts.
    fn entity_started(&self, index: usize, total: usize, company: &str);
    /// Called after an entity finishes, `succeeded = false` if it was skipped.
    fn entity_finished(&self, index: usize, total: usize, company: &str, succeeded: bool);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentBatchProgress;

impl BatchProgress for SilentBatchProgress {
    fn entity_started(&self, _index: usize, _total: usize, _company: &str) {}
    fn entity_finished(&self, _index: usize, _total: usize, _company: &str, _succeeded: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizintel_shared::{AnalysisRecord, Field};

    fn outcome(company: &str, score: Option<u8>) -> BatchOutcome {
        BatchOutcome {
            company: company.into(),
            directive: "d".into(),
            record: AnalysisRecord {
                prospect_score: score.into(),
                ..AnalysisRecord::default()
            },
            customer_match: None,
            narrative: String::new(),
        }
    }

    #[tokio::test]
    async fn aborted_worker_is_a_job_error() {
        let task = tokio::spawn(std::future::pending::<()>());
        task.abort();
        let handle = JobHandle::new(JobId::new(), 1, task);

        let err = handle.wait().await.unwrap_err();
        assert!(matches!(err, BizIntelError::Job(_)));
        assert!(err.to_string().starts_with("job error: worker for "));
    }

    #[tokio::test]
    async fn finished_worker_is_reported() {
        let handle = JobHandle::new(JobId::new(), 0, tokio::spawn(async {}));
        while !handle.is_finished() {
            tokio::task::yield_now().await;
        }
        handle.wait().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let store = JobStore::new();
        let err = store.snapshot(JobId::new()).await.unwrap_err();
        assert!(matches!(err, BizIntelError::JobNotFound(_)));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn results_keep_completion_order_until_completed() {
        let store = JobStore::new();
        let id = JobId::new();
        store.insert(BatchJob::new(id, 3)).await;

        store.record_success(id, outcome("low", Some(40))).await.unwrap();
        store.record_success(id, outcome("none", None)).await.unwrap();
        store.record_success(id, outcome("high", Some(90))).await.unwrap();

        let running = store.snapshot(id).await.unwrap();
        let order: Vec<_> = running.results.iter().map(|r| r.company.as_str()).collect();
        assert_eq!(order, ["low", "none", "high"]);
        assert_eq!(running.status, JobStatus::Processing);

        store.complete(id).await.unwrap();
        let done = store.snapshot(id).await.unwrap();
        let order: Vec<_> = done.results.iter().map(|r| r.company.as_str()).collect();
        assert_eq!(order, ["high", "low", "none"]);
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.finished_at.is_some());
        assert_eq!(done.results[2].record.prospect_score, Field::Unknown);
    }

    #[tokio::test]
    async fn settled_jobs_do_not_transition_again() {
        let store = JobStore::new();
        let id = JobId::new();
        store.insert(BatchJob::new(id, 2)).await;

        store.fail(id, "input unreadable").await.unwrap();
        store.complete(id).await.unwrap();
        store.record_success(id, outcome("late", Some(10))).await.unwrap();

        let job = store.snapshot(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("input unreadable"));
        assert!(job.results.is_empty());
        assert_eq!(job.completed, 0);
    }

    #[tokio::test]
    async fn completed_never_exceeds_total() {
        let store = JobStore::new();
        let id = JobId::new();
        store.insert(BatchJob::new(id, 1)).await;
        store.record_success(id, outcome("a", Some(1))).await.unwrap();
        store.record_success(id, outcome("b", Some(2))).await.unwrap();
        let job = store.snapshot(id).await.unwrap();
        assert_eq!(job.completed, 1);
        assert_eq!(job.results.len(), 1);
    }

    #[tokio::test]
    async fn outstanding_and_prune() {
        let store = JobStore::new();
        let running = JobId::new();
        let finished = JobId::new();
        store.insert(BatchJob::new(running, 1)).await;
        store.insert(BatchJob::new(finished, 1)).await;
        store.complete(finished).await.unwrap();

        assert_eq!(store.outstanding().await, vec![running]);
        assert_eq!(store.list().await.len(), 2);

        // nothing finished more than an hour ago
        assert_eq!(store.prune_finished(Duration::from_secs(3600)).await, 0);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(store.prune_finished(Duration::ZERO).await, 1);
        assert!(store.snapshot(finished).await.is_err());
        assert!(store.snapshot(running).await.is_ok());
    }
}
