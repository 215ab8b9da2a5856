//! Handlers - one per operation
//!
//! A handler returns `Ok(Reply)` for every outcome it can explain
//! (including failures such as a failed priming run). `Err` is reserved for
//! problems the dispatcher turns into a generic failed response.

mod register;
mod remove;
mod sync;
mod workflow;

use crate::context::WorkerContext;
use crate::reporter::StatusReporter;
use hermes_foundation::{OperationKind, RepoKey, ResponseStatus, Result, Task, TaskResponse};
use serde_json::Value;

/// Terminal outcome of a handler
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: ResponseStatus,
    pub message: String,
    pub extra: Option<Value>,
}

impl Reply {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: message.into(),
            extra: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Failed,
            message: message.into(),
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn into_response(self, task: &Task) -> TaskResponse {
        TaskResponse {
            task_id: task.task_id.clone(),
            requester_id: task.requester_id.clone(),
            status: self.status,
            message: self.message,
            operation: Some(task.operation),
            extra: self.extra,
        }
    }
}

/// Route a decoded task to its handler
pub async fn handle(ctx: &WorkerContext, task: &Task, reporter: &StatusReporter) -> Result<Reply> {
    match task.operation {
        OperationKind::RegisterRepo => register::handle(ctx, task, reporter).await,
        OperationKind::RemoveRepo => remove::handle(ctx, task, reporter).await,
        OperationKind::SyncRepo => sync::handle(ctx, task, reporter).await,
        OperationKind::RunWorkflow => workflow::handle(ctx, task, reporter).await,
    }
}

fn repo_key(task: &Task, short_name: &str) -> RepoKey {
    RepoKey::new(task.requester_id.clone(), short_name)
}
