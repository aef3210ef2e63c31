//! Engine error types.

use reconflow_core::{JobId, ScanType, TargetId};
use reconflow_db::DatabaseError;
use reconflow_scripts::ScriptError;
use reconflow_sources::SourceError;
use thiserror::Error;

/// Errors surfaced to callers of the orchestrator.
///
/// Only failures that happen before a job exists reach the caller of
/// `start_scan`; everything after dispatch lands in the job record.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No target with this id.
    #[error("Target '{0}' not found")]
    TargetNotFound(TargetId),

    /// No job with this id.
    #[error("Job '{0}' not found")]
    JobNotFound(JobId),

    /// No adapter is registered for the scan type.
    #[error("No adapter registered for scan type '{0}'")]
    UnsupportedScan(ScanType),

    /// Job store failure.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Script runner failure outside of a job.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Adapter construction failure.
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl EngineError {
    /// Whether the error names a missing target or job.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TargetNotFound(_) | Self::JobNotFound(_))
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
