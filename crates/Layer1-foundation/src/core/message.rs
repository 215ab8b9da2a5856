//! Outbound messages - Status / Response
//!
//! Every outbound message is tagged with `task_id` and `requester_id` so the
//! front-end can correlate replies regardless of delivery order.

use super::types::{OperationKind, RequesterId, TaskId};
use serde::{Deserialize, Serialize};

/// Category of a non-terminal status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCategory {
    /// Low-level progress (clone, checkout, pull)
    Technical,
    /// High-level workflow progress
    Workflow,
    /// Raw agent output
    Agent,
    /// Non-fatal problems worth surfacing
    Error,
}

impl MessageCategory {
    pub const ALL: [MessageCategory; 4] = [
        MessageCategory::Technical,
        MessageCategory::Workflow,
        MessageCategory::Agent,
        MessageCategory::Error,
    ];
}

/// Non-terminal progress update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub task_id: TaskId,
    pub requester_id: RequesterId,
    pub category: MessageCategory,
    pub text: String,
    /// The "started" notice; suppressed more aggressively than other workflow messages
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub started: bool,
}

/// Terminal outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// The single terminal message of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task_id: TaskId,
    pub requester_id: RequesterId,
    pub status: ResponseStatus,
    pub message: String,
    /// Operation name; `None` when the task could not be decoded far enough to know it
    pub operation: Option<OperationKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl TaskResponse {
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

/// Anything the worker publishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outbound {
    Status(StatusMessage),
    Response(TaskResponse),
}

impl Outbound {
    pub fn task_id(&self) -> &TaskId {
        match self {
            Outbound::Status(s) => &s.task_id,
            Outbound::Response(r) => &r.task_id,
        }
    }

    pub fn requester_id(&self) -> &RequesterId {
        match self {
            Outbound::Status(s) => &s.requester_id,
            Outbound::Response(r) => &r.requester_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Outbound::Response(_))
    }

    pub fn as_response(&self) -> Option<&TaskResponse> {
        match self {
            Outbound::Response(r) => Some(r),
            Outbound::Status(_) => None,
        }
    }
}
