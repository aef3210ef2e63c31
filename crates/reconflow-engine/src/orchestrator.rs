//! Scan orchestration.
//!
//! [`ReconOrchestrator`] turns a `(target, scan type)` request into a job:
//! it records the job as running, hands the adapter to a background task and
//! returns the job id without waiting for the scan. A second task supervises
//! the first and routes its outcome, including a panic, through the
//! [`JobReporter`], so no job is left running after its adapter is gone.

use crate::error::{EngineError, Result};
use crate::registry::AdapterRegistry;
use crate::reporter::JobReporter;
use reconflow_core::{AppConfig, JobId, JobStatus, ScanType, SettingsProvider, TargetId};
use reconflow_db::{jobs, targets, Database, DatabaseError, Job};
use reconflow_events::{ProgressBus, ProgressPublisher, ScopeKey, Subscription};
use reconflow_scripts::{parse_recon_results, OutputFile, ProcessInfo, ReconResults, ScriptRunner};
use reconflow_sources::{JobContext, SourceAdapter};
use std::sync::Arc;
use tokio::task::JoinError;

/// Entry point for starting, inspecting and killing scans.
pub struct ReconOrchestrator {
    db: Database,
    bus: Arc<ProgressBus>,
    registry: Arc<AdapterRegistry>,
    runner: Arc<ScriptRunner>,
}

impl ReconOrchestrator {
    /// Create an orchestrator from its collaborators.
    ///
    /// `runner` should be the one backing the registry's script adapters,
    /// otherwise [`kill_job`](Self::kill_job) cannot see their processes.
    #[must_use]
    pub fn new(
        db: Database,
        bus: Arc<ProgressBus>,
        registry: Arc<AdapterRegistry>,
        runner: Arc<ScriptRunner>,
    ) -> Self {
        Self {
            db,
            bus,
            registry,
            runner,
        }
    }

    /// Build the production orchestrator. Credentials are read from `db`.
    pub fn from_config(config: &AppConfig, db: Database) -> Result<Self> {
        let bus = Arc::new(ProgressBus::from_config(&config.events));
        let runner = Arc::new(ScriptRunner::new(config.scripts.clone()));
        let settings: Arc<dyn SettingsProvider> = Arc::new(db.clone());
        let registry = AdapterRegistry::with_defaults(&config.sources, &settings, &runner)?;
        Ok(Self::new(db, bus, Arc::new(registry), runner))
    }

    /// The progress bus jobs publish to.
    #[must_use]
    pub fn bus(&self) -> &Arc<ProgressBus> {
        &self.bus
    }

    /// Observe events for a job, a target, or every status change.
    #[must_use]
    pub fn subscribe(&self, key: ScopeKey) -> Subscription {
        self.bus.subscribe(key)
    }

    /// Start a scan and return its job id without waiting for it.
    ///
    /// # Errors
    /// `TargetNotFound` for an unknown target and `UnsupportedScan` when no
    /// adapter is registered. Adapter failures never surface here; they end
    /// up in the job record.
    pub async fn start_scan(&self, target_id: &TargetId, scan_type: ScanType) -> Result<JobId> {
        let target = targets::get_target(self.db.pool(), target_id)
            .await?
            .ok_or_else(|| EngineError::TargetNotFound(target_id.clone()))?;
        let adapter = self.registry.get(scan_type)?;

        let job = jobs::create_job(self.db.pool(), &target.id, scan_type, JobStatus::Running).await?;
        let progress = ProgressPublisher::new(Arc::clone(&self.bus), job.id.clone(), target.id);
        progress.status(JobStatus::Running, None);
        tracing::info!(
            job_id = %job.id,
            target_id = %target_id,
            %scan_type,
            domain = %target.domain,
            "scan started"
        );

        self.dispatch(adapter, target.domain, progress);
        Ok(job.id)
    }

    fn dispatch(&self, adapter: Arc<dyn SourceAdapter>, domain: String, progress: ProgressPublisher) {
        let reporter = JobReporter::new(self.db.clone(), progress.clone());
        let ctx = JobContext::new(domain, progress);
        let job_id = ctx.job_id().clone();
        let scan_type = adapter.scan_type();

        let worker = tokio::spawn(async move { adapter.run(&ctx).await });

        tokio::spawn(async move {
            let reported = match worker.await {
                Ok(Ok(outcome)) => reporter.succeed(outcome).await,
                Ok(Err(e)) => {
                    tracing::warn!(job_id = %job_id, %scan_type, error = %e, "scan failed");
                    reporter.fail(&e.to_string()).await
                }
                Err(e) => {
                    let message = abort_message(e);
                    tracing::error!(job_id = %job_id, %scan_type, error = %message, "scan task aborted");
                    reporter.fail(&message).await
                }
            };
            if let Err(e) = reported {
                tracing::error!(job_id = %job_id, error = %e, "could not record scan outcome");
            }
        });
    }

    /// Current record of a job.
    pub async fn get_job_status(&self, job_id: &JobId) -> Result<Job> {
        jobs::get_job(self.db.pool(), job_id)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound(_) => EngineError::JobNotFound(job_id.clone()),
                other => other.into(),
            })
    }

    /// Every job, newest first.
    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        Ok(jobs::list_jobs(self.db.pool()).await?)
    }

    /// Jobs of one target, newest first.
    pub async fn list_jobs_for_target(&self, target_id: &TargetId) -> Result<Vec<Job>> {
        Ok(jobs::list_jobs_for_target(self.db.pool(), target_id).await?)
    }

    /// Terminate a job's script process.
    ///
    /// Returns `false` when the job has no live process: HTTP scans, finished
    /// scripts and unknown ids alike.
    pub fn kill_job(&self, job_id: &JobId) -> bool {
        self.runner.kill(job_id)
    }

    /// Files a script left for `domain`, plus the job's log when `job_id` is given.
    pub async fn get_output_files(
        &self,
        domain: &str,
        job_id: Option<&JobId>,
    ) -> Result<Vec<OutputFile>> {
        Ok(self.runner.output_files(domain, job_id).await?)
    }

    /// Subdomains and live hosts the recon scripts wrote for a target.
    pub async fn get_recon_results(&self, target_id: &TargetId) -> Result<ReconResults> {
        let target = targets::get_target(self.db.pool(), target_id)
            .await?
            .ok_or_else(|| EngineError::TargetNotFound(target_id.clone()))?;
        let dir = self.runner.target_dir(&target.domain)?;
        Ok(parse_recon_results(&dir).await?)
    }

    /// Snapshot of a job's live script process.
    #[must_use]
    pub fn process_info(&self, job_id: &JobId) -> Option<ProcessInfo> {
        self.runner.process_info(job_id)
    }

    /// Jobs with a live script process.
    #[must_use]
    pub fn active_jobs(&self) -> Vec<JobId> {
        self.runner.active_jobs()
    }
}

fn abort_message(err: JoinError) -> String {
    if !err.is_panic() {
        return "Scan task was cancelled".to_string();
    }
    let panic = err.into_panic();
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned());
    match detail {
        Some(detail) => format!("Scan task panicked: {detail}"),
        None => "Scan task panicked".to_string(),
    }
}
