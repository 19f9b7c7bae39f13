//! EventSink implementations: tracing output and an in-memory recorder.

use std::sync::Mutex;

use crate::domain::DomainEvent;
use crate::ports::EventSink;

/// Logs domain events through `tracing`. Progress goes to `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: DomainEvent) {
        match &event {
            DomainEvent::UploadProgress {
                batch_id,
                file_id,
                percent,
            } => {
                tracing::debug!(%batch_id, %file_id, percent, "upload progress");
            }
            DomainEvent::UploadFailed {
                batch_id,
                file_id,
                reason,
            } => {
                tracing::warn!(%batch_id, %file_id, %reason, "upload failed");
            }
            other => tracing::info!(event = ?other, "courier event"),
        }
    }
}

/// Keeps every event in memory, in emit order.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: DomainEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
