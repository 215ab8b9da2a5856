//! remove-repo: delete working copy and record, each independently

use super::{repo_key, Reply};
use crate::context::WorkerContext;
use crate::reporter::StatusReporter;
use hermes_foundation::{RemoveRepo, Result, Task};
use hermes_task::{remove_working_copy, validate_short_name};
use serde_json::json;
use tracing::{error, info};

pub(super) async fn handle(
    ctx: &WorkerContext,
    task: &Task,
    reporter: &StatusReporter,
) -> Result<Reply> {
    let payload: RemoveRepo = task.payload_as()?;
    validate_short_name(&payload.short_name)?;

    let key = repo_key(task, &payload.short_name);
    let _guard = ctx.locks.acquire(&key).await?;
    let repo_dir = ctx.layout.repo_dir(&task.requester_id, &payload.short_name);

    reporter
        .started(format!("Removing repository {}", payload.short_name))
        .await;

    // Both steps always run; a failure in one is logged and reported below.
    let directory = remove_working_copy(&repo_dir).await;
    if let Err(e) = &directory {
        error!(key = %key, dir = %repo_dir.display(), "Failed to delete working copy: {}", e);
    }
    let record = ctx
        .store
        .delete(&task.requester_id, &payload.short_name)
        .await;
    if let Err(e) = &record {
        error!(key = %key, "Failed to delete repository record: {}", e);
    }

    match (directory, record) {
        (Ok(dir_removed), Ok(record_removed)) => {
            reporter
                .technical(format!(
                    "Working copy {}, record {}",
                    if dir_removed { "deleted" } else { "already absent" },
                    if record_removed { "deleted" } else { "already absent" },
                ))
                .await;
            info!(key = %key, dir_removed, record_removed, "Repository removed");

            let message = if dir_removed || record_removed {
                format!("Repository {} removed", payload.short_name)
            } else {
                format!("Repository {} was not registered; nothing to remove", payload.short_name)
            };
            Ok(Reply::success(message).with_extra(json!({
                "short_name": payload.short_name,
                "directory_removed": dir_removed,
                "record_removed": record_removed,
            })))
        }
        (directory, record) => Ok(Reply::failed(format!(
            "Repository {} was only partially removed; please retry",
            payload.short_name
        ))
        .with_extra(json!({
            "short_name": payload.short_name,
            "directory_removed": directory.unwrap_or(false),
            "record_removed": record.unwrap_or(false),
        }))),
    }
}
