//! Agent invoker 통합 테스트 - fake agent CLIs written as shell scripts
//!
//! `cargo test -p hermes-task --test agent_invoker`
#![cfg(unix)]

use hermes_foundation::Secret;
use hermes_task::{Agent, AgentPromptRequest, ClaudeInvoker};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Write an executable `/bin/sh` script named `fake-agent`
fn fake_agent(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-agent");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn request(dir: &TempDir) -> AgentPromptRequest {
    AgentPromptRequest::new(
        "/prime",
        "task-7",
        dir.path(),
        dir.path().join(".agents/task-7/prime/raw_output.jsonl"),
    )
    .with_model("sonnet")
}

fn invoker(binary: &Path) -> ClaudeInvoker {
    ClaudeInvoker::new(binary.to_string_lossy())
        .with_api_key(Secret::new("sk-test"))
        .with_timeout(Duration::from_secs(20))
        .with_grace_period(Duration::from_millis(200))
}

#[tokio::test]
async fn test_result_event_is_output() {
    let dir = tempfile::tempdir().unwrap();
    let agent = fake_agent(
        dir.path(),
        r#"echo '{"type":"system","subtype":"init","session_id":"sess-1"}'
echo '{"type":"assistant","message":{"content":[{"type":"text","text":"Scanning"}]}}'
echo '{"type":"result","subtype":"success","is_error":false,"result":"Found 42 files","session_id":"sess-1"}'"#,
    );

    let req = request(&dir);
    let result = invoker(&agent).prompt(&req).await;

    assert!(result.succeeded, "{:?}", result);
    assert_eq!(result.output_text, "Found 42 files");
    assert_eq!(result.session_id.as_deref(), Some("sess-1"));
    assert!(!result.empty_transcript);

    let transcript = std::fs::read_to_string(&req.transcript_path).unwrap();
    assert_eq!(transcript.lines().count(), 3);
}

#[tokio::test]
async fn test_assistant_fallback_without_result() {
    let dir = tempfile::tempdir().unwrap();
    let agent = fake_agent(
        dir.path(),
        r#"echo '{"type":"assistant","message":{"content":[{"type":"text","text":"A"}]}}'
echo '{"type":"assistant","message":{"content":[{"type":"text","text":"B"}]}}'"#,
    );

    let result = invoker(&agent).prompt(&request(&dir)).await;
    assert!(result.succeeded);
    assert_eq!(result.output_text, "A\nB");
}

#[tokio::test]
async fn test_reported_error_is_explained() {
    let dir = tempfile::tempdir().unwrap();
    let agent = fake_agent(
        dir.path(),
        r#"echo '{"type":"assistant","message":{"content":[{"type":"text","text":"partial work"}]}}'
echo '{"type":"result","subtype":"error_during_execution","is_error":true}'
exit 1"#,
    );

    let result = invoker(&agent).prompt(&request(&dir)).await;
    assert!(!result.succeeded);
    assert_eq!(
        result.output_text,
        "agent reported an error (error_during_execution)"
    );
    assert!(!result.output_text.contains("partial work"));
}

#[tokio::test]
async fn test_timeout_kills_agent() {
    let dir = tempfile::tempdir().unwrap();
    let agent = fake_agent(
        dir.path(),
        r#"echo '{"type":"assistant","message":{"content":[{"type":"text","text":"working"}]}}'
sleep 30"#,
    );

    let req = request(&dir);
    let started = std::time::Instant::now();
    let result = invoker(&agent)
        .with_timeout(Duration::from_secs(1))
        .prompt(&req)
        .await;

    assert!(!result.succeeded);
    assert!(result.timed_out);
    assert_eq!(result.output_text, "agent timed out after 1s");
    assert!(started.elapsed() < Duration::from_secs(15));
    assert!(req.transcript_path.exists());
}

#[tokio::test]
async fn test_launch_failure_is_immediate() {
    let dir = tempfile::tempdir().unwrap();
    let req = request(&dir);
    let started = std::time::Instant::now();
    let result = invoker(&dir.path().join("missing-agent")).prompt(&req).await;

    assert!(!result.succeeded);
    assert!(result.output_text.starts_with("failed to launch agent"));
    assert!(started.elapsed() < Duration::from_secs(5));
    // transcript still exists for post-mortem
    assert!(req.transcript_path.exists());
}

#[tokio::test]
async fn test_empty_transcript_is_warning_not_failure() {
    let dir = tempfile::tempdir().unwrap();
    let agent = fake_agent(dir.path(), "exit 0");

    let result = invoker(&agent).prompt(&request(&dir)).await;
    assert!(result.succeeded);
    assert!(result.empty_transcript);
    assert_eq!(result.output_text, "");
}

#[tokio::test]
async fn test_crash_without_result_fails() {
    let dir = tempfile::tempdir().unwrap();
    let agent = fake_agent(dir.path(), "echo 'boom' >&2\nexit 2");

    let result = invoker(&agent).prompt(&request(&dir)).await;
    assert!(!result.succeeded);
    assert_eq!(result.output_text, "agent exited with status 2");
}

#[tokio::test]
async fn test_environment_is_minimal() {
    let dir = tempfile::tempdir().unwrap();
    // Report the variable names the agent can see, plus its working directory
    let agent = fake_agent(
        dir.path(),
        r#"names=$(env | cut -d= -f1 | sort | tr '\n' ' ')
printf '{"type":"result","subtype":"success","is_error":false,"result":"%s|%s|%s"}\n' "$names" "$HERMES_CORRELATION_ID" "$(pwd)""#,
    );

    let req = request(&dir);
    let result = invoker(&agent).prompt(&req).await;
    assert!(result.succeeded, "{:?}", result);

    let mut parts = result.output_text.split('|');
    let names: Vec<&str> = parts.next().unwrap().split_whitespace().collect();
    assert!(names.contains(&"ANTHROPIC_API_KEY"));
    assert!(names.contains(&"HERMES_CORRELATION_ID"));
    // cargo exports CARGO_* to the test process; none of it may leak through
    assert!(names.iter().all(|n| !n.starts_with("CARGO")), "{:?}", names);
    assert_eq!(parts.next(), Some("task-7"));

    let cwd = PathBuf::from(parts.next().unwrap());
    assert_eq!(cwd.canonicalize().unwrap(), dir.path().canonicalize().unwrap());
}
