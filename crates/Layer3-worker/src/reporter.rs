//! Status reporter - filtered, best-effort progress messages for one task

use crate::channel::ResponseSink;
use crate::filter;
use hermes_foundation::{MessageCategory, Outbound, ReportingLevel, StatusMessage, Task};
use std::sync::Arc;
use tracing::{debug, warn};

/// Emits non-terminal status messages for one task.
///
/// Every message goes through the filter first; publish failures are
/// logged and swallowed.
#[derive(Clone)]
pub struct StatusReporter {
    task: Arc<Task>,
    sink: Arc<dyn ResponseSink>,
}

impl StatusReporter {
    pub fn new(task: Arc<Task>, sink: Arc<dyn ResponseSink>) -> Self {
        Self { task, sink }
    }

    pub fn level(&self) -> ReportingLevel {
        self.task.reporting_level
    }

    pub async fn started(&self, text: impl Into<String>) {
        self.emit(MessageCategory::Workflow, text.into(), true).await;
    }

    pub async fn workflow(&self, text: impl Into<String>) {
        self.emit(MessageCategory::Workflow, text.into(), false).await;
    }

    pub async fn technical(&self, text: impl Into<String>) {
        self.emit(MessageCategory::Technical, text.into(), false).await;
    }

    pub async fn agent(&self, text: impl Into<String>) {
        self.emit(MessageCategory::Agent, text.into(), false).await;
    }

    pub async fn error(&self, text: impl Into<String>) {
        self.emit(MessageCategory::Error, text.into(), false).await;
    }

    async fn emit(&self, category: MessageCategory, text: String, started: bool) {
        let status = StatusMessage {
            task_id: self.task.task_id.clone(),
            requester_id: self.task.requester_id.clone(),
            category,
            text,
            started,
        };

        if !filter::permits_status(&status, self.level()) {
            debug!(
                task_id = %status.task_id,
                category = ?category,
                level = %self.level(),
                "Status suppressed"
            );
            return;
        }

        if let Err(e) = self.sink.publish(&Outbound::Status(status)).await {
            warn!(task_id = %self.task.task_id, "Dropping status message: {}", e);
        }
    }
}
