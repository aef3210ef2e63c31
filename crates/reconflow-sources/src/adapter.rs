//! Core source adapter trait and the types passed across it.

use crate::error::{Result, SourceError};
use async_trait::async_trait;
use reconflow_core::{JobId, ScanType, TargetId};
use reconflow_events::ProgressPublisher;
use serde::Serialize;
use serde_json::Value;

/// A unit of work that produces a normalized result for one domain.
///
/// Adapters publish intermediate progress through the [`JobContext`] and
/// return their outcome. They never write the job record or publish terminal
/// events; the orchestrator does both once `run` returns.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The scan kind this adapter performs.
    fn scan_type(&self) -> ScanType;

    /// Run the scan for `ctx.domain()`.
    async fn run(&self, ctx: &JobContext) -> Result<ScanOutcome>;
}

/// Everything an adapter knows about the job it is running for.
#[derive(Debug, Clone)]
pub struct JobContext {
    domain: String,
    progress: ProgressPublisher,
}

impl JobContext {
    /// Create a context for one job.
    #[must_use]
    pub fn new(domain: impl Into<String>, progress: ProgressPublisher) -> Self {
        Self {
            domain: domain.into(),
            progress,
        }
    }

    /// Job being run.
    #[must_use]
    pub fn job_id(&self) -> &JobId {
        self.progress.job_id()
    }

    /// Target the job runs against.
    #[must_use]
    pub fn target_id(&self) -> &TargetId {
        self.progress.target_id()
    }

    /// Domain being scanned.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Publisher for this job's progress events.
    #[must_use]
    pub fn progress(&self) -> &ProgressPublisher {
        &self.progress
    }

    /// Publish a progress message.
    pub fn update(&self, text: impl Into<String>) {
        self.progress.update(text);
    }
}

/// What an adapter hands back on success.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    /// Normalized result, stored in the job record
    pub result: Value,
    /// Summary published after the result is stored
    pub summary: Option<String>,
}

impl ScanOutcome {
    /// Build an outcome from any serializable result shape.
    pub fn from_result(result: &impl Serialize) -> Result<Self> {
        let result = serde_json::to_value(result)
            .map_err(|e| SourceError::Internal(format!("failed to encode result: {e}")))?;
        Ok(Self {
            result,
            summary: None,
        })
    }

    /// Attach a summary message.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}
