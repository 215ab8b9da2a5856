//! run-workflow against real git: the agent's work ends up on a pushed branch
//! and the next sync leaves it alone.
//!
//! Returns early when `git` is not on PATH.

use async_trait::async_trait;
use chrono::Utc;
use hermes_foundation::{
    MemoryRepositoryStore, OperationKind, RepositoryRecord, RepositoryStore, RequesterId,
    ResponseStatus, Task, TaskId, WorkerConfig,
};
use hermes_task::{
    Agent, AgentPromptRequest, AgentPromptResult, RepositoryManager, WorkspaceLayout,
};
use hermes_worker::{memory_channel, Dispatcher, MemorySink, WorkerContext};
use serde_json::json;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=Hermes Test", "-c", "user.email=test@hermes.dev"])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Bare `origin.git` with one commit on `main`
fn origin(root: &Path) -> String {
    let seed = root.join("seed");
    std::fs::create_dir_all(&seed).unwrap();
    git(&seed, &["init", "--quiet"]);
    git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    std::fs::write(seed.join("README.md"), "# demo\n").unwrap();
    git(&seed, &["add", "."]);
    git(&seed, &["commit", "--quiet", "-m", "initial"]);
    git(root, &["clone", "--quiet", "--bare", "seed", "origin.git"]);
    root.join("origin.git").to_string_lossy().into_owned()
}

/// Writes a plan, then code, into the working directory
struct WritingAgent;

#[async_trait]
impl Agent for WritingAgent {
    async fn prompt(&self, request: &AgentPromptRequest) -> AgentPromptResult {
        let dir = &request.working_directory;
        if request.prompt.starts_with("/feature") {
            std::fs::create_dir_all(dir.join("specs")).unwrap();
            std::fs::write(dir.join("specs/plan.md"), "# plan\n").unwrap();
            AgentPromptResult::success("specs/plan.md")
        } else {
            std::fs::write(dir.join("pagination.rs"), "pub fn page() {}\n").unwrap();
            AgentPromptResult::success("implemented")
        }
    }
}

fn context(config: &WorkerConfig, store: &Arc<MemoryRepositoryStore>) -> WorkerContext {
    WorkerContext::new(
        config,
        store.clone(),
        Arc::new(RepositoryManager::from_config(config)),
        Arc::new(WritingAgent),
    )
}

async fn run(ctx: WorkerContext, sink: &Arc<MemorySink>, task: Task) {
    let (sender, source) = memory_channel();
    sender.send(&task).unwrap();
    drop(sender);
    Dispatcher::new(ctx, sink.clone()).run(source).await.unwrap();
}

#[tokio::test]
async fn test_workflow_changes_survive_sync() {
    if !git_available() {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let remote = origin(root.path());
    let config = WorkerConfig::new()
        .workspace_dir(root.path().join("ws"))
        .agent_api_key("test-key");

    let store = Arc::new(MemoryRepositoryStore::new());
    let mut record = RepositoryRecord::new(RequesterId::new("42"), "demo", remote.clone());
    record.record_priming(true, "primed earlier", Utc::now(), 1024);
    store.upsert(&record).await.unwrap();

    let sink = Arc::new(MemorySink::new());

    run(
        context(&config, &store),
        &sink,
        Task::new(
            "t-1",
            "42",
            OperationKind::RunWorkflow,
            json!({
                "short_name": "demo",
                "workflow": "plan_build",
                "title": "Add pagination",
                "description": "Page the list endpoint.",
            }),
        ),
    )
    .await;

    let response = sink.response_for(&TaskId::new("t-1")).unwrap();
    assert_eq!(response.status, ResponseStatus::Success, "{}", response.message);
    let extra = response.extra.unwrap();
    let branch = extra["branch"].as_str().unwrap().to_string();
    assert_eq!(extra["pushed"], json!(true));
    assert_eq!(extra["commits"].as_array().unwrap().len(), 2);

    let origin_dir = root.path().join("origin.git");
    assert_eq!(
        git(&origin_dir, &["show", &format!("{}:specs/plan.md", branch)]),
        "# plan"
    );
    assert_eq!(
        git(&origin_dir, &["show", &format!("{}:pagination.rs", branch)]),
        "pub fn page() {}"
    );

    run(
        context(&config, &store),
        &sink,
        Task::new("t-2", "42", OperationKind::SyncRepo, json!({"short_name": "demo"})),
    )
    .await;

    let synced = sink.response_for(&TaskId::new("t-2")).unwrap();
    assert_eq!(synced.status, ResponseStatus::Success);
    assert_eq!(synced.extra.unwrap()["outcome"], json!("already up to date"));

    let copy = WorkspaceLayout::new(&config.workspace_dir).repo_dir(&RequesterId::new("42"), "demo");
    assert_eq!(git(&copy, &["rev-parse", "--abbrev-ref", "HEAD"]), "main");
    assert_eq!(
        git(&copy, &["rev-list", "--count", &format!("main..{}", branch)]),
        "2"
    );
}
