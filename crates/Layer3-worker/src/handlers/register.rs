//! register-repo: clone, prime, persist

use super::{repo_key, Reply};
use crate::context::WorkerContext;
use crate::prompts::{AGENT_PRIMER, PRIME_PROMPT};
use crate::reporter::StatusReporter;
use chrono::Utc;
use hermes_foundation::{Error, RegisterRepo, RepositoryRecord, Result, Task};
use hermes_task::git::normalize_remote;
use hermes_task::{validate_short_name, AgentPromptRequest};
use serde_json::json;
use tracing::{info, warn};

pub(super) async fn handle(
    ctx: &WorkerContext,
    task: &Task,
    reporter: &StatusReporter,
) -> Result<Reply> {
    let payload: RegisterRepo = task.payload_as()?;
    validate_short_name(&payload.short_name)?;
    let remote_url = normalize_remote(&payload.remote_url);
    if remote_url.is_empty() {
        return Err(Error::InvalidInput("remote_url is empty".into()));
    }

    let key = repo_key(task, &payload.short_name);
    let _guard = ctx.locks.acquire(&key).await?;
    let repo_dir = ctx.layout.repo_dir(&task.requester_id, &payload.short_name);

    let existing = ctx
        .store
        .find(&task.requester_id, &payload.short_name)
        .await?;

    if let Some(record) = &existing {
        if record.registered && normalize_remote(&record.remote_url) != remote_url {
            return Err(Error::InvalidInput(format!(
                "'{}' is already registered for a different remote; remove it first",
                payload.short_name
            )));
        }
        if record.is_fully_registered() && repo_dir.is_dir() {
            info!(key = %key, "Repository already registered, replaying stored prime output");
            return Ok(already_registered(record));
        }
    }

    let mut record = match existing {
        Some(record) if record.registered => record,
        _ => RepositoryRecord::new(
            task.requester_id.clone(),
            payload.short_name.clone(),
            remote_url.clone(),
        ),
    };
    if !record.registered {
        ctx.store.upsert(&record).await?;
    }

    reporter
        .started(format!("Registering repository {}", payload.short_name))
        .await;
    reporter
        .technical(format!("Preparing working copy at {}", repo_dir.display()))
        .await;

    let ready = ctx.provisioner.ensure_ready(&remote_url, &repo_dir).await?;
    reporter
        .workflow(format!(
            "Repository ready on {} ({})",
            ready.branch,
            short_sha(&ready.head)
        ))
        .await;

    reporter.workflow("Priming the agent on the codebase").await;
    let request = AgentPromptRequest::new(
        PRIME_PROMPT,
        task.task_id.as_str(),
        &ready.path,
        ctx.layout.transcript_path(&task.task_id, AGENT_PRIMER),
    )
    .with_model(ctx.settings.agent_model.clone());
    let outcome = ctx.agent.prompt(&request).await;

    record.record_priming(
        outcome.succeeded,
        &outcome.output_text,
        Utc::now(),
        ctx.settings.prime_output_limit,
    );
    ctx.store.upsert(&record).await?;

    if outcome.empty_transcript {
        warn!(key = %key, "Priming finished with an empty transcript");
    }

    let extra = json!({
        "short_name": payload.short_name,
        "remote_url": record.remote_url,
        "branch": ready.branch,
        "head": ready.head,
        "primed": outcome.succeeded,
        "prime_output": record.prime_output,
        "session_id": outcome.session_id,
    });

    match outcome.error() {
        None => {
            info!(key = %key, "Repository registered and primed");
            reporter.agent(outcome.output_text.clone()).await;
            Ok(Reply::success(format!(
                "Repository {} registered.\n\n{}",
                payload.short_name,
                record.prime_output.as_deref().unwrap_or_default()
            ))
            .with_extra(extra))
        }
        Some(e) => {
            warn!(key = %key, "Priming failed: {}", e);
            reporter
                .error(format!("Priming failed: {}", outcome.output_text))
                .await;
            Ok(Reply::failed(format!(
                "Repository {} was cloned but priming failed. {}",
                payload.short_name,
                e.user_message()
            ))
            .with_extra(extra))
        }
    }
}

fn already_registered(record: &RepositoryRecord) -> Reply {
    Reply::success(format!(
        "Repository {} is already registered.\n\n{}",
        record.short_name,
        record.prime_output.as_deref().unwrap_or_default()
    ))
    .with_extra(json!({
        "short_name": record.short_name,
        "remote_url": record.remote_url,
        "primed": record.primed,
        "prime_output": record.prime_output,
        "last_primed_at": record.last_primed_at,
        "already_registered": true,
    }))
}

pub(super) fn short_sha(head: &str) -> &str {
    head.get(..8).unwrap_or(head)
}
