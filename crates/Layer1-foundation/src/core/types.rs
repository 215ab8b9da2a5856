//! Core Types - 작업 단위 정의
//!
//! A [`Task`] is decoded once from the intake channel and never mutated
//! afterwards. Its `payload` stays raw JSON until a handler asks for the
//! typed form with [`Task::payload_as`].

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque task token used for every correlation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owner/tenant identifier.
///
/// Chat front-ends usually hand out numeric user ids, so both JSON numbers
/// and strings are accepted. It always serializes as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RequesterId(pub String);

impl RequesterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for RequesterId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => RequesterId(s),
            Raw::Signed(n) => RequesterId(n.to_string()),
            Raw::Unsigned(n) => RequesterId(n.to_string()),
        })
    }
}

impl std::fmt::Display for RequesterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Reporting Level
// ============================================================================

/// Per-task verbosity. Ordered from quietest to noisiest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ReportingLevel {
    /// Errors and the terminal response only
    Minimal,
    /// Errors and high-level workflow progress
    #[default]
    Basic,
    /// Basic plus technical progress (git steps)
    Detailed,
    /// Everything, including agent output
    Verbose,
}

impl ReportingLevel {
    pub const ALL: [ReportingLevel; 4] = [
        ReportingLevel::Minimal,
        ReportingLevel::Basic,
        ReportingLevel::Detailed,
        ReportingLevel::Verbose,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportingLevel::Minimal => "minimal",
            ReportingLevel::Basic => "basic",
            ReportingLevel::Detailed => "detailed",
            ReportingLevel::Verbose => "verbose",
        }
    }
}

impl std::fmt::Display for ReportingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Operation discriminator carried by every task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Clone + prime a repository
    #[serde(alias = "git_clone")]
    RegisterRepo,

    /// Drop the working copy and the persisted record
    RemoveRepo,

    /// Bring an existing working copy up to date
    #[serde(alias = "git_pull")]
    SyncRepo,

    /// Run an AI workflow (plan / build) against a registered repository
    #[serde(alias = "adw")]
    RunWorkflow,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::RegisterRepo => "register_repo",
            OperationKind::RemoveRepo => "remove_repo",
            OperationKind::SyncRepo => "sync_repo",
            OperationKind::RunWorkflow => "run_workflow",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// register-repo payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRepo {
    pub short_name: String,
    /// Full URL or `owner/repo`
    #[serde(alias = "repo_url", alias = "full_url")]
    pub remote_url: String,
}

/// remove-repo payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveRepo {
    pub short_name: String,
}

/// sync-repo payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRepo {
    pub short_name: String,
}

/// Which phases a workflow runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Plan,
    Build,
    #[default]
    PlanBuild,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::Plan => "plan",
            WorkflowKind::Build => "build",
            WorkflowKind::PlanBuild => "plan_build",
        }
    }
}

/// run-workflow payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunWorkflow {
    pub short_name: String,
    #[serde(default, alias = "workflow_name")]
    pub workflow: WorkflowKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(alias = "task_description")]
    pub description: String,
    /// Issue tracker key, e.g. `MS-1234`
    #[serde(default, alias = "jira_ticket")]
    pub ticket: Option<String>,
}

impl RunWorkflow {
    /// Title, or the first line of the description cut to 50 chars
    pub fn effective_title(&self) -> String {
        match self.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => self
                .description
                .lines()
                .next()
                .unwrap_or_default()
                .chars()
                .take(50)
                .collect(),
        }
    }
}

// ============================================================================
// Task
// ============================================================================

/// One unit of work delivered to the worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,

    #[serde(alias = "telegram_id")]
    pub requester_id: RequesterId,

    pub operation: OperationKind,

    /// Operation-specific data, decoded lazily
    #[serde(default)]
    pub payload: serde_json::Value,

    #[serde(default)]
    pub reporting_level: ReportingLevel,
}

impl Task {
    pub fn new(
        task_id: impl Into<String>,
        requester_id: impl Into<String>,
        operation: OperationKind,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            task_id: TaskId::new(task_id),
            requester_id: RequesterId::new(requester_id),
            operation,
            payload,
            reporting_level: ReportingLevel::default(),
        }
    }

    /// Set reporting level
    pub fn with_reporting_level(mut self, level: ReportingLevel) -> Self {
        self.reporting_level = level;
        self
    }

    /// Decode a wire message
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| Error::InvalidInput(format!("malformed task: {}", e)))
    }

    /// Decode the payload into the operation's typed form
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            Error::InvalidInput(format!("bad {} payload: {}", self.operation, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_register_task() {
        let raw = r#"{
            "task_id": "t-1",
            "requester_id": 4242,
            "operation": "register_repo",
            "payload": {"short_name": "backend", "remote_url": "acme/backend"}
        }"#;
        let task = Task::from_json(raw).unwrap();
        assert_eq!(task.requester_id.as_str(), "4242");
        assert_eq!(task.reporting_level, ReportingLevel::Basic);

        let payload: RegisterRepo = task.payload_as().unwrap();
        assert_eq!(payload.short_name, "backend");
    }

    #[test]
    fn test_legacy_operation_names() {
        let raw = json!({
            "task_id": "t-2",
            "telegram_id": "7",
            "operation": "git_pull",
            "payload": {"short_name": "web"},
            "reporting_level": "verbose"
        });
        let task: Task = serde_json::from_value(raw).unwrap();
        assert_eq!(task.operation, OperationKind::SyncRepo);
        assert_eq!(task.reporting_level, ReportingLevel::Verbose);
    }

    #[test]
    fn test_unknown_operation_rejected() {
        let raw = r#"{"task_id":"t","requester_id":"r","operation":"format_disk"}"#;
        assert!(matches!(Task::from_json(raw), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_bad_payload() {
        let task = Task::new("t", "r", OperationKind::RemoveRepo, json!({"name": "x"}));
        assert!(task.payload_as::<RemoveRepo>().is_err());
    }

    #[test]
    fn test_effective_title() {
        let wf = RunWorkflow {
            short_name: "api".into(),
            workflow: WorkflowKind::default(),
            title: None,
            description: "Add pagination to the list endpoint\nMore detail".into(),
            ticket: None,
        };
        assert_eq!(wf.effective_title(), "Add pagination to the list endpoint");
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(ReportingLevel::Minimal < ReportingLevel::Basic);
        assert!(ReportingLevel::Detailed < ReportingLevel::Verbose);
    }
}
