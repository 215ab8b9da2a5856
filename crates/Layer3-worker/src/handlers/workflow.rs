//! run-workflow: plan and/or build phases on a fresh branch of a registered
//! repository, one commit per phase, pushed when done

use super::register::short_sha;
use super::{repo_key, Reply};
use crate::context::WorkerContext;
use crate::prompts::{
    build_prompt, completion_summary, plan_prompt, CompletionFacts, AGENT_IMPLEMENTOR,
    AGENT_PLANNER,
};
use crate::reporter::StatusReporter;
use hermes_foundation::strings::truncate_chars;
use hermes_foundation::{Error, Result, RunWorkflow, Task, WorkflowKind};
use hermes_task::{validate_short_name, AgentPromptRequest, AgentPromptResult};
use serde_json::{json, Value};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// Agent output forwarded as an agent status is cut to this many chars
const PHASE_OUTPUT_PREVIEW: usize = 2000;

const BRANCH_SLUG_LIMIT: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Plan,
    Build,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Plan => "plan",
            Phase::Build => "build",
        }
    }

    fn agent(self) -> &'static str {
        match self {
            Phase::Plan => AGENT_PLANNER,
            Phase::Build => AGENT_IMPLEMENTOR,
        }
    }
}

fn phases(kind: WorkflowKind) -> &'static [Phase] {
    match kind {
        WorkflowKind::Plan => &[Phase::Plan],
        WorkflowKind::Build => &[Phase::Build],
        WorkflowKind::PlanBuild => &[Phase::Plan, Phase::Build],
    }
}

pub(super) async fn handle(
    ctx: &WorkerContext,
    task: &Task,
    reporter: &StatusReporter,
) -> Result<Reply> {
    let payload: RunWorkflow = task.payload_as()?;
    validate_short_name(&payload.short_name)?;
    if payload.description.trim().is_empty() {
        return Err(Error::InvalidInput("description is empty".into()));
    }

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

    let run_id: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    let title = payload.effective_title();
    reporter
        .started(format!("Starting workflow: {}", title))
        .await;

    let repo_dir = ctx.layout.repo_dir(&task.requester_id, &payload.short_name);
    let ready = ctx
        .provisioner
        .ensure_ready(&record.remote_url, &repo_dir)
        .await?;

    let branch = work_branch(&run_id, &title);
    ctx.provisioner.start_branch(&ready.path, &branch).await?;
    reporter
        .technical(format!(
            "Working on {} from {} at {}",
            branch,
            ready.branch,
            short_sha(&ready.head)
        ))
        .await;

    let run = run_phases(ctx, task, reporter, &payload, &run_id, &branch, &ready.path).await;

    // Leave the default branch checked out so the next sync updates in place.
    if let Err(e) = ctx.provisioner.switch_branch(&ready.path, &ready.branch).await {
        warn!(key = %key, branch = %ready.branch, "Cannot switch back: {}", e);
    }
    let run = run?;

    if let Some((phase, e)) = run.failure {
        reporter
            .error(format!("{} phase failed: {}", phase.name(), e))
            .await;
        return Ok(Reply::failed(format!(
            "Workflow {} stopped in the {} phase. {}",
            title,
            phase.name(),
            e.user_message()
        ))
        .with_extra(json!({
            "workflow": payload.workflow.as_str(),
            "run_id": run_id,
            "branch": branch,
            "commits": run.commits,
            "failed_phase": phase.name(),
            "phases": run.log,
        })));
    }

    let pushed = if run.commits.is_empty() {
        false
    } else {
        match ctx.provisioner.push_branch(&ready.path, &branch).await {
            Ok(()) => {
                reporter.workflow(format!("Pushed {}", branch)).await;
                true
            }
            Err(e) => {
                warn!(key = %key, branch = %branch, "Push failed: {}", e);
                reporter
                    .error(format!("Could not push {}; the commits stay in the working copy", branch))
                    .await;
                false
            }
        }
    };

    let facts = CompletionFacts {
        workflow: Some(payload.workflow.as_str().to_string()),
        branch: Some(branch.clone()),
        commits: run.commits.len(),
        phases: run.phases,
        ticket: payload.ticket.clone().filter(|t| !t.trim().is_empty()),
    };
    let summary = completion_summary(&facts);
    info!(
        key = %key,
        run_id = %run_id,
        phases = facts.phases.len(),
        commits = facts.commits,
        pushed,
        "Workflow completed"
    );

    Ok(Reply::success(summary.clone()).with_extra(json!({
        "workflow": payload.workflow.as_str(),
        "run_id": run_id,
        "title": title,
        "branch": branch,
        "base_branch": ready.branch,
        "commits": run.commits,
        "pushed": pushed,
        "phases": run.log,
        "summary": summary,
    })))
}

/// What the phases left behind on the working branch
#[derive(Debug, Default)]
struct PhaseRun {
    log: Vec<Value>,
    phases: Vec<String>,
    commits: Vec<String>,
    failure: Option<(Phase, Error)>,
}

/// Run each phase and commit its changes; `Err` only when a commit fails
async fn run_phases(
    ctx: &WorkerContext,
    task: &Task,
    reporter: &StatusReporter,
    payload: &RunWorkflow,
    run_id: &str,
    branch: &str,
    working_dir: &Path,
) -> Result<PhaseRun> {
    let title = payload.effective_title();
    let mut run = PhaseRun::default();
    let mut plan_output: Option<String> = None;

    for &phase in phases(payload.workflow) {
        let prompt = match phase {
            Phase::Plan => plan_prompt(&task.task_id, run_id, payload),
            Phase::Build => build_prompt(payload, plan_output.as_deref()),
        };

        reporter
            .workflow(format!("Running {} phase", phase.name()))
            .await;
        let outcome = run_phase(ctx, task, phase, working_dir, prompt).await;
        run.log.push(json!({
            "phase": phase.name(),
            "succeeded": outcome.succeeded,
            "session_id": outcome.session_id.clone(),
        }));

        if let Some(e) = outcome.error() {
            warn!(branch, phase = phase.name(), "Workflow phase failed: {}", e);
            // keep partial work on the branch rather than in a dirty tree
            let message = format!("{}: {}: {} (incomplete)", phase.agent(), phase.name(), title);
            match ctx.provisioner.commit_all(working_dir, &message).await {
                Ok(Some(sha)) => run.commits.push(sha),
                Ok(None) => {}
                Err(commit_err) => warn!(branch, "Cannot commit partial work: {}", commit_err),
            }
            run.failure = Some((phase, e));
            return Ok(run);
        }

        reporter
            .agent(truncate_chars(&outcome.output_text, PHASE_OUTPUT_PREVIEW).into_owned())
            .await;

        let message = format!("{}: {}: {}", phase.agent(), phase.name(), title);
        if let Some(sha) = ctx.provisioner.commit_all(working_dir, &message).await? {
            reporter
                .technical(format!("Committed {} phase as {}", phase.name(), short_sha(&sha)))
                .await;
            run.commits.push(sha);
        }

        run.phases.push(phase.name().to_string());
        if phase == Phase::Plan {
            plan_output = Some(outcome.output_text);
        }
    }
    Ok(run)
}

/// `hermes/<run_id>-<slug of the title>`
fn work_branch(run_id: &str, title: &str) -> String {
    let words: Vec<String> = title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .take(6)
        .map(str::to_ascii_lowercase)
        .collect();
    let mut slug = words.join("-");
    slug.truncate(BRANCH_SLUG_LIMIT);
    let slug = slug.trim_end_matches('-');

    if slug.is_empty() {
        format!("hermes/{}", run_id)
    } else {
        format!("hermes/{}-{}", run_id, slug)
    }
}

async fn run_phase(
    ctx: &WorkerContext,
    task: &Task,
    phase: Phase,
    working_dir: &Path,
    prompt: String,
) -> AgentPromptResult {
    let request = AgentPromptRequest::new(
        prompt,
        task.task_id.as_str(),
        working_dir,
        ctx.layout.transcript_path(&task.task_id, phase.agent()),
    )
    .with_model(ctx.settings.agent_model.clone());
    ctx.agent.prompt(&request).await
}
