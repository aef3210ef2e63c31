//! Per-job publishing handle.

use crate::bus::{ProgressBus, ScopeKey};
use crate::event::{
    BusEvent, JobStatusChange, OutputStream, ProgressEvent, ProgressKind, ProgressPayload,
};
use chrono::Utc;
use reconflow_core::{JobId, JobStatus, TargetId};
use serde_json::Value;
use std::sync::Arc;

/// Publishes events for one job to its job scope and its target scope.
#[derive(Debug, Clone)]
pub struct ProgressPublisher {
    bus: Arc<ProgressBus>,
    job_id: JobId,
    target_id: TargetId,
}

impl ProgressPublisher {
    /// Create a publisher bound to one job.
    #[must_use]
    pub fn new(bus: Arc<ProgressBus>, job_id: JobId, target_id: TargetId) -> Self {
        Self {
            bus,
            job_id,
            target_id,
        }
    }

    /// Job this publisher reports on.
    #[must_use]
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Target the job runs against.
    #[must_use]
    pub fn target_id(&self) -> &TargetId {
        &self.target_id
    }

    /// Publish a human-readable progress message.
    pub fn update(&self, text: impl Into<String>) {
        self.emit(
            ProgressKind::Update,
            ProgressPayload::Message { text: text.into() },
        );
    }

    /// Publish a chunk of script output.
    pub fn output(&self, stream: OutputStream, text: impl Into<String>) {
        self.emit(
            ProgressKind::Update,
            ProgressPayload::Output {
                stream,
                text: text.into(),
            },
        );
    }

    /// Publish the terminal success event.
    pub fn complete(&self, result: Value) {
        self.emit(ProgressKind::Complete, ProgressPayload::Result { result });
    }

    /// Publish the terminal failure event.
    pub fn error(&self, message: impl Into<String>) {
        self.emit(
            ProgressKind::Error,
            ProgressPayload::Message {
                text: message.into(),
            },
        );
    }

    /// Broadcast a status transition on the global scope.
    pub fn status(&self, status: JobStatus, result: Option<Value>) {
        let change = JobStatusChange {
            job_id: self.job_id.clone(),
            target_id: self.target_id.clone(),
            status,
            result,
            timestamp: Utc::now(),
        };
        self.bus.publish(&ScopeKey::Global, BusEvent::Status(change));
    }

    fn emit(&self, kind: ProgressKind, payload: ProgressPayload) {
        let event = BusEvent::Progress(ProgressEvent {
            job_id: self.job_id.clone(),
            target_id: self.target_id.clone(),
            kind,
            payload,
            timestamp: Utc::now(),
        });
        self.bus
            .publish(&ScopeKey::Target(self.target_id.clone()), event.clone());
        self.bus.publish(&ScopeKey::Job(self.job_id.clone()), event);
    }
}
