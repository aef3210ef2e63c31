//! Terminal job transitions.
//!
//! [`JobReporter`] is the single writer of a job's terminal state. The store
//! write always lands before the terminal event is published, so an observer
//! that sees `complete` or `error` and then queries the job reads the final
//! record.
//!
//! A store write that keeps failing is retried a few times. If it never lands,
//! an `error` event still goes out so observers waiting for a terminal event
//! are released.

use crate::error::Result;
use reconflow_core::JobStatus;
use reconflow_db::{jobs, Database};
use reconflow_events::ProgressPublisher;
use reconflow_sources::ScanOutcome;
use serde_json::{json, Value};
use std::time::Duration;

const WRITE_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Writes a job's final state and announces it.
pub struct JobReporter {
    db: Database,
    progress: ProgressPublisher,
}

impl JobReporter {
    /// Create a reporter for the job `progress` publishes for.
    #[must_use]
    pub fn new(db: Database, progress: ProgressPublisher) -> Self {
        Self { db, progress }
    }

    /// Record a successful run.
    ///
    /// Returns `false` if the job was already terminal; nothing is published then.
    pub async fn succeed(&self, outcome: ScanOutcome) -> Result<bool> {
        if !self.finish(JobStatus::Completed, &outcome.result).await? {
            return Ok(false);
        }
        if let Some(summary) = outcome.summary {
            self.progress.update(summary);
        }
        self.progress.complete(outcome.result.clone());
        self.progress
            .status(JobStatus::Completed, Some(outcome.result));
        Ok(true)
    }

    /// Record a failed run with a displayable message.
    ///
    /// Returns `false` if the job was already terminal; nothing is published then.
    pub async fn fail(&self, message: &str) -> Result<bool> {
        let result = json!({ "error": message });
        if !self.finish(JobStatus::Failed, &result).await? {
            return Ok(false);
        }
        self.progress.error(message);
        self.progress.status(JobStatus::Failed, Some(result));
        Ok(true)
    }

    async fn finish(&self, status: JobStatus, result: &Value) -> Result<bool> {
        let job_id = self.progress.job_id();
        let applied = match self.write_terminal(status, result).await {
            Ok(applied) => applied,
            Err(e) => {
                tracing::error!(job_id = %job_id, %status, error = %e, "terminal write failed");
                self.progress.error(format!("Could not record job outcome: {e}"));
                return Err(e.into());
            }
        };
        if applied {
            tracing::info!(job_id = %job_id, %status, "job finished");
        } else {
            tracing::warn!(job_id = %job_id, %status, "job already terminal, ignoring second transition");
        }
        Ok(applied)
    }

    async fn write_terminal(&self, status: JobStatus, result: &Value) -> reconflow_db::Result<bool> {
        let job_id = self.progress.job_id();
        let mut delay = RETRY_DELAY;
        let mut attempt = 1;
        loop {
            match jobs::finish_job(self.db.pool(), job_id, status, result).await {
                Err(e) if e.is_transient() && attempt < WRITE_ATTEMPTS => {
                    tracing::warn!(job_id = %job_id, attempt, error = %e, "terminal write failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                written => return written,
            }
        }
    }
}
