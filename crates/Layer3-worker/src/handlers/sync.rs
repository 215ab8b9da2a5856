//! sync-repo: bring a registered working copy to the remote tip

use super::register::short_sha;
use super::{repo_key, Reply};
use crate::context::WorkerContext;
use crate::reporter::StatusReporter;
use hermes_foundation::{Error, Result, SyncRepo, Task};
use hermes_task::{validate_short_name, Provisioning};
use serde_json::json;
use tracing::info;

pub(super) async fn handle(
    ctx: &WorkerContext,
    task: &Task,
    reporter: &StatusReporter,
) -> Result<Reply> {
    let payload: SyncRepo = task.payload_as()?;
    validate_short_name(&payload.short_name)?;

    let key = repo_key(task, &payload.short_name);
    let _guard = ctx.locks.acquire(&key).await?;

    let record = ctx
        .store
        .find(&task.requester_id, &payload.short_name)
        .await?
        .filter(|r| r.registered)
        .ok_or_else(|| {
            Error::NotFound(format!(
                "Repository {} is not registered",
                payload.short_name
            ))
        })?;

    reporter
        .started(format!("Syncing repository {}", payload.short_name))
        .await;

    let repo_dir = ctx.layout.repo_dir(&task.requester_id, &payload.short_name);
    let ready = ctx
        .provisioner
        .ensure_ready(&record.remote_url, &repo_dir)
        .await?;

    let outcome = match ready.provisioning {
        Provisioning::Updated if ready.head_moved() => "updated",
        Provisioning::Updated => "already up to date",
        Provisioning::Cloned | Provisioning::Recovered => "re-cloned",
    };
    reporter
        .technical(format!(
            "{} on {} at {}",
            outcome,
            ready.branch,
            short_sha(&ready.head)
        ))
        .await;
    info!(key = %key, outcome, head = %ready.head, "Repository synced");

    Ok(Reply::success(format!(
        "Repository {} {} ({} at {})",
        payload.short_name,
        outcome,
        ready.branch,
        short_sha(&ready.head)
    ))
    .with_extra(json!({
        "short_name": payload.short_name,
        "branch": ready.branch,
        "head": ready.head,
        "previous_head": ready.previous_head,
        "outcome": outcome,
    })))
}
