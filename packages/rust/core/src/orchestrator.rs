//! Batch job orchestration.
//!
//! [`Orchestrator::submit`] validates a batch, registers a job and returns at
//! once. A detached worker then analyses the entities one after another,
//! recording each success in the [`JobStore`]. A failed entity is skipped.
//! The job fails only when the worker itself dies.

use std::sync::Arc;
use std::time::Duration;

use tracing::{Instrument, error, info, info_span, warn};

use bizintel_shared::{BatchEntry, BatchJob, BizIntelError, JobId, Result};

use crate::jobs::{BatchProgress, JobHandle, JobStore, SilentBatchProgress};
use crate::pipeline::{AnalysisDeps, analyze_entity};

/// Owns the job registry and the backends batch workers run against.
#[derive(Clone)]
pub struct Orchestrator {
    deps: AnalysisDeps,
    jobs: JobStore,
    progress: Arc<dyn BatchProgress>,
    retention: Option<Duration>,
}

impl Orchestrator {
    pub fn new(deps: AnalysisDeps) -> Self {
        Self {
            deps,
            jobs: JobStore::new(),
            progress: Arc::new(SilentBatchProgress),
            retention: None,
        }
    }

    /// Evict finished jobs older than `retention` on each submit.
    /// `None` keeps every job for the life of the orchestrator.
    pub fn with_retention(mut self, retention: Option<Duration>) -> Self {
        self.retention = retention;
        self
    }

    /// Report per-entity progress to `progress`.
    pub fn with_progress(mut self, progress: Arc<dyn BatchProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    /// Validate `entries`, register a job and start its worker.
    pub async fn submit(&self, entries: Vec<BatchEntry>, analyst: &str) -> Result<JobHandle> {
        validate(&entries)?;
        if let Some(retention) = self.retention {
            self.jobs.prune_finished(retention).await;
        }

        let id = JobId::new();
        let total = entries.len();
        self.jobs.insert(BatchJob::new(id, total)).await;
        info!(job = %id, total, "batch job submitted");

        let worker = Worker {
            id,
            entries,
            analyst: analyst.to_string(),
            deps: self.deps.clone(),
            jobs: self.jobs.clone(),
            progress: self.progress.clone(),
        };
        let task = tokio::spawn(worker.supervise().instrument(info_span!("batch_job", job = %id)));

        Ok(JobHandle::new(id, total, task))
    }

    /// Snapshot of job `id`.
    pub async fn status(&self, id: JobId) -> Result<BatchJob> {
        self.jobs.snapshot(id).await
    }
}

/// Reject empty batches and entries missing a mandatory field.
pub fn validate(entries: &[BatchEntry]) -> Result<()> {
    if entries.is_empty() {
        return Err(BizIntelError::validation("batch contains no entries"));
    }
    for (i, entry) in entries.iter().enumerate() {
        let row = i + 1;
        if entry.company_name.trim().is_empty() {
            return Err(BizIntelError::validation(format!(
                "entry {row}: company_name is required"
            )));
        }
        if entry.directive.trim().is_empty() {
            return Err(BizIntelError::validation(format!(
                "entry {row}: directive is required"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct Worker {
    id: JobId,
    entries: Vec<BatchEntry>,
    analyst: String,
    deps: AnalysisDeps,
    jobs: JobStore,
    progress: Arc<dyn BatchProgress>,
}

impl Worker {
    /// Run the batch on its own task so a panic is observed here and turned
    /// into a failed job instead of a job stuck in `processing`.
    async fn supervise(self) {
        let id = self.id;
        let jobs = self.jobs.clone();

        let outcome = tokio::spawn(self.run().in_current_span()).await;
        let settled = match outcome {
            Ok(()) => jobs.complete(id).await,
            Err(e) => {
                let message = if e.is_panic() {
                    "batch worker panicked".to_string()
                } else {
                    format!("batch worker stopped: {e}")
                };
                error!(job = %id, %message, "batch job failed");
                jobs.fail(id, message).await
            }
        };
        if let Err(e) = settled {
            warn!(job = %id, error = %e, "could not settle job");
            return;
        }

        if let Ok(job) = jobs.snapshot(id).await {
            info!(
                job = %id,
                status = %job.status,
                completed = job.completed,
                total = job.total,
                "batch job finished"
            );
        }
    }

    async fn run(self) {
        let total = self.entries.len();
        for (index, entry) in self.entries.iter().enumerate() {
            self.progress.entity_started(index, total, &entry.company_name);

            let succeeded = match analyze_entity(
                &entry.company_name,
                &entry.directive,
                &self.analyst,
                &self.deps,
            )
            .await
            {
                Ok(analysis) => {
                    match self.jobs.record_success(self.id, analysis.into_outcome()).await {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(company = %entry.company_name, error = %e, "could not record outcome");
                            false
                        }
                    }
                }
                Err(e) => {
                    warn!(company = %entry.company_name, error = %e, "entity skipped");
                    false
                }
            };

            self.progress
                .entity_finished(index, total, &entry.company_name, succeeded);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::generator::testing::ScriptedGenerator;
    use crate::store::MemoryStore;
    use bizintel_shared::JobStatus;

    fn narrative(score: u8) -> String {
        format!("## 3. PROSPECT ANALYSIS\n**Prospect Level:** High\n**Prospect Score:** {score}\n")
    }

    fn orchestrator(generator: ScriptedGenerator) -> (Orchestrator, Arc<MemoryStore>) {
        shared_orchestrator(Arc::new(generator))
    }

    fn shared_orchestrator(generator: Arc<ScriptedGenerator>) -> (Orchestrator, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let deps = AnalysisDeps {
            store: store.clone(),
            generator,
            temperature: 0.2,
            max_output_tokens: 8000,
        };
        (Orchestrator::new(deps), store)
    }

    fn batch(names: &[&str]) -> Vec<BatchEntry> {
        names
            .iter()
            .map(|n| BatchEntry::new(*n, "assess fit"))
            .collect()
    }

    #[tokio::test]
    async fn failed_entity_is_skipped_and_job_completes() {
        let generator = Arc::new(
            ScriptedGenerator::new()
                .reply("Alpha", narrative(55))
                .fail("Bravo")
                .reply("Charlie", narrative(80)),
        );
        let (orch, store) = shared_orchestrator(generator.clone());

        let handle = orch
            .submit(batch(&["Alpha", "Bravo", "Charlie"]), "analyst")
            .await
            .unwrap();
        assert_eq!(handle.total(), 3);
        let id = handle.id();
        handle.wait().await.unwrap();

        let job = orch.status(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.total, 3);
        assert_eq!(job.completed, 2);
        assert_eq!(job.results.len(), 2);
        assert!((job.progress_percent() - 200.0 / 3.0).abs() < 1e-9);
        let order: Vec<_> = job.results.iter().map(|r| r.company.as_str()).collect();
        assert_eq!(order, ["Charlie", "Alpha"]);
        assert!(job.error.is_none());
        assert_eq!(store.analyses().len(), 2);
        // one generation per entity, failures are not retried by the worker
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn submit_returns_before_work_finishes() {
        let generator = ScriptedGenerator::new()
            .reply("Alpha", narrative(10))
            .with_delay(Duration::from_millis(50));
        let (orch, _) = orchestrator(generator);

        let handle = orch.submit(batch(&["Alpha"]), "a").await.unwrap();
        assert!(!handle.is_finished());
        let job = orch.status(handle.id()).await.unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.completed, 0);
        handle.wait().await.unwrap();
    }

    #[tokio::test]
    async fn polled_progress_is_monotonic() {
        let generator = ScriptedGenerator::new()
            .reply("Alpha", narrative(10))
            .reply("Bravo", narrative(20))
            .reply("Charlie", narrative(30))
            .reply("Delta", narrative(40))
            .with_delay(Duration::from_millis(10));
        let (orch, _) = orchestrator(generator);
        let handle = orch
            .submit(batch(&["Alpha", "Bravo", "Charlie", "Delta"]), "a")
            .await
            .unwrap();
        let id = handle.id();

        let mut last = 0;
        loop {
            let job = orch.status(id).await.unwrap();
            assert!(job.completed >= last);
            assert!(job.completed <= job.total);
            assert_eq!(job.results.len(), job.completed);
            last = job.completed;
            if job.status.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(last, 4);
        handle.wait().await.unwrap();
    }

    #[tokio::test]
    async fn worker_panic_fails_the_job() {
        let generator = ScriptedGenerator::new()
            .reply("Alpha", narrative(70))
            .panic_on("Bravo");
        let (orch, _) = orchestrator(generator);

        let handle = orch.submit(batch(&["Alpha", "Bravo"]), "a").await.unwrap();
        let id = handle.id();
        handle.wait().await.unwrap();

        let job = orch.status(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.is_some());
        assert_eq!(job.completed, 1);
    }

    #[tokio::test]
    async fn invalid_batches_are_rejected_synchronously() {
        let (orch, _) = orchestrator(ScriptedGenerator::new());

        let err = orch.submit(Vec::new(), "a").await.unwrap_err();
        assert!(matches!(err, BizIntelError::Validation { .. }));

        let err = orch
            .submit(vec![BatchEntry::new("Alpha", "  ")], "a")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("directive"));

        let err = orch
            .submit(vec![BatchEntry::new("", "assess")], "a")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("company_name"));

        assert!(orch.jobs().list().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_job_id_is_a_client_error() {
        let (orch, _) = orchestrator(ScriptedGenerator::new());
        let err = orch.status(JobId::new()).await.unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn jobs_are_independent() {
        let generator = ScriptedGenerator::new()
            .reply("Alpha", narrative(10))
            .reply("Bravo", narrative(20));
        let (orch, _) = orchestrator(generator);

        let first = orch.submit(batch(&["Alpha"]), "a").await.unwrap();
        let second = orch.submit(batch(&["Bravo"]), "a").await.unwrap();
        let (a, b) = (first.id(), second.id());
        first.wait().await.unwrap();
        second.wait().await.unwrap();

        assert_eq!(orch.status(a).await.unwrap().results[0].company, "Alpha");
        assert_eq!(orch.status(b).await.unwrap().results[0].company, "Bravo");
        assert!(orch.jobs().outstanding().await.is_empty());
    }

    #[tokio::test]
    async fn retention_evicts_old_jobs_on_submit() {
        let generator = ScriptedGenerator::new()
            .reply("Alpha", narrative(10))
            .reply("Bravo", narrative(20));
        let (orch, _) = orchestrator(generator);
        let orch = orch.with_retention(Some(Duration::ZERO));

        let first = orch.submit(batch(&["Alpha"]), "a").await.unwrap();
        let first_id = first.id();
        first.wait().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let second = orch.submit(batch(&["Bravo"]), "a").await.unwrap();
        assert!(orch.status(first_id).await.is_err());
        assert!(orch.status(second.id()).await.is_ok());
        second.wait().await.unwrap();
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, bool)>>);

    impl BatchProgress for Recorder {
        fn entity_started(&self, _index: usize, _total: usize, _company: &str) {}
        fn entity_finished(&self, _index: usize, _total: usize, company: &str, succeeded: bool) {
            self.0.lock().unwrap().push((company.to_string(), succeeded));
        }
    }

    #[tokio::test]
    async fn progress_reports_each_entity() {
        let generator = ScriptedGenerator::new().reply("Alpha", narrative(10));
        let (orch, _) = orchestrator(generator);
        let recorder = Arc::new(Recorder::default());
        let orch = orch.with_progress(recorder.clone());

        let handle = orch.submit(batch(&["Alpha", "Bravo"]), "a").await.unwrap();
        handle.wait().await.unwrap();

        let seen = recorder.0.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![("Alpha".to_string(), true), ("Bravo".to_string(), false)]
        );
    }
}
