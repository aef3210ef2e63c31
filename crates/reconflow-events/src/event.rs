//! Event types carried by the progress bus.

use chrono::{DateTime, Utc};
use reconflow_core::{JobId, JobStatus, TargetId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    /// Intermediate progress
    Update,
    /// Terminal success, payload is the final result
    Complete,
    /// Terminal failure, payload is the error message
    Error,
}

/// Which output stream of a script a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

/// Body of a progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProgressPayload {
    /// Human-readable progress or error text
    Message {
        /// The text
        text: String,
    },
    /// A chunk of script output
    Output {
        /// Source stream
        stream: OutputStream,
        /// One line, without its terminator
        text: String,
    },
    /// The final result of a completed job
    Result {
        /// Result payload as stored in the job record
        result: Value,
    },
}

impl ProgressPayload {
    /// The textual content, if this payload carries text.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Message { text } | Self::Output { text, .. } => Some(text),
            Self::Result { .. } => None,
        }
    }
}

/// Ephemeral progress notification for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Job the event belongs to
    pub job_id: JobId,
    /// Target the job runs against
    pub target_id: TargetId,
    /// Event kind
    pub kind: ProgressKind,
    /// Event body
    pub payload: ProgressPayload,
    /// When the event was published
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    /// Whether this is the last event a job will publish.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, ProgressKind::Complete | ProgressKind::Error)
    }
}

/// A job status transition, broadcast on the global scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusChange {
    /// Job that transitioned
    pub job_id: JobId,
    /// Target the job runs against
    pub target_id: TargetId,
    /// New status
    pub status: JobStatus,
    /// Final payload, present for terminal transitions
    pub result: Option<Value>,
    /// When the transition was published
    pub timestamp: DateTime<Utc>,
}

/// Anything that travels over the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum BusEvent {
    /// Per-job progress
    Progress(ProgressEvent),
    /// System-wide status transition
    Status(JobStatusChange),
}

impl BusEvent {
    /// The job this event concerns.
    #[must_use]
    pub fn job_id(&self) -> &JobId {
        match self {
            Self::Progress(event) => &event.job_id,
            Self::Status(change) => &change.job_id,
        }
    }

    /// Borrow the progress event, if this is one.
    #[must_use]
    pub fn as_progress(&self) -> Option<&ProgressEvent> {
        match self {
            Self::Progress(event) => Some(event),
            Self::Status(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_progress_event_wire_shape() {
        let event = ProgressEvent {
            job_id: JobId::from_stored("job-1".to_string()),
            target_id: TargetId::new("t-1").expect("valid"),
            kind: ProgressKind::Update,
            payload: ProgressPayload::Output {
                stream: OutputStream::Stderr,
                text: "warn\n".to_string(),
            },
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(BusEvent::Progress(event)).expect("serialize");
        assert_eq!(value["event"], "progress");
        assert_eq!(value["data"]["jobId"], "job-1");
        assert_eq!(value["data"]["kind"], "update");
        assert_eq!(value["data"]["payload"]["type"], "output");
        assert_eq!(value["data"]["payload"]["stream"], "stderr");
    }

    #[test]
    fn test_terminal_kinds() {
        let mut event = ProgressEvent {
            job_id: JobId::generate(),
            target_id: TargetId::generate(),
            kind: ProgressKind::Update,
            payload: ProgressPayload::Result { result: json!({}) },
            timestamp: Utc::now(),
        };
        assert!(!event.is_terminal());
        event.kind = ProgressKind::Error;
        assert!(event.is_terminal());
        assert!(event.payload.text().is_none());
    }
}
