//! Agent prompts and completion summaries

use hermes_foundation::{RunWorkflow, TaskId};

/// Fixed priming prompt run once after a repository is registered
pub const PRIME_PROMPT: &str = "/prime";

/// Agent names, used in transcript paths
pub const AGENT_PRIMER: &str = "primer";
pub const AGENT_PLANNER: &str = "sdlc_planner";
pub const AGENT_IMPLEMENTOR: &str = "sdlc_implementor";

/// Task body shared by both phases
pub fn task_brief(workflow: &RunWorkflow) -> String {
    let mut brief = format!("# Task: {}\n", workflow.effective_title());
    if let Some(ticket) = workflow.ticket.as_deref().filter(|t| !t.trim().is_empty()) {
        brief.push_str(&format!("\n**Ticket:** {}\n", ticket.trim()));
    }
    brief.push_str(&format!("\n{}\n", workflow.description.trim()));
    brief
}

/// Plan phase: `/feature <task_id> <run_id> <brief>`
pub fn plan_prompt(task_id: &TaskId, run_id: &str, workflow: &RunWorkflow) -> String {
    format!("/feature {} {} {}", task_id, run_id, task_brief(workflow))
}

/// Build phase: implement the plan, or the brief itself when there is no plan
pub fn build_prompt(workflow: &RunWorkflow, plan: Option<&str>) -> String {
    match plan.map(str::trim).filter(|p| !p.is_empty()) {
        Some(plan) => format!("/implement {}", plan),
        None => format!("/implement {}", task_brief(workflow)),
    }
}

/// Facts collected while a workflow runs
#[derive(Debug, Clone, Default)]
pub struct CompletionFacts {
    pub workflow: Option<String>,
    pub branch: Option<String>,
    pub commits: usize,
    pub phases: Vec<String>,
    pub ticket: Option<String>,
}

/// Bullet list of the facts, or a plain success line when there are none
pub fn completion_summary(facts: &CompletionFacts) -> String {
    let mut parts = Vec::new();
    if let Some(workflow) = &facts.workflow {
        parts.push(format!("Workflow: {}", workflow));
    }
    if let Some(ticket) = &facts.ticket {
        parts.push(format!("Ticket: {}", ticket));
    }
    if let Some(branch) = &facts.branch {
        parts.push(format!("Branch: {}", branch));
    }
    if facts.commits > 0 {
        parts.push(format!("Commits: {}", facts.commits));
    }
    if !facts.phases.is_empty() {
        parts.push(format!("Phases: {}", facts.phases.join(", ")));
    }

    if parts.is_empty() {
        "Workflow completed successfully".to_string()
    } else {
        parts
            .iter()
            .map(|p| format!("• {}", p))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_foundation::WorkflowKind;

    fn workflow() -> RunWorkflow {
        RunWorkflow {
            short_name: "api".into(),
            workflow: WorkflowKind::PlanBuild,
            title: Some("Add pagination".into()),
            description: "The list endpoint returns everything.".into(),
            ticket: Some("MS-12".into()),
        }
    }

    #[test]
    fn test_plan_prompt() {
        let prompt = plan_prompt(&TaskId::new("t-1"), "ab12cd34", &workflow());
        assert!(prompt.starts_with("/feature t-1 ab12cd34 # Task: Add pagination"));
        assert!(prompt.contains("**Ticket:** MS-12"));
        assert!(prompt.contains("returns everything"));
    }

    #[test]
    fn test_build_prompt_prefers_plan() {
        assert_eq!(
            build_prompt(&workflow(), Some("specs/plan.md")),
            "/implement specs/plan.md"
        );
        assert!(build_prompt(&workflow(), Some("  ")).contains("# Task: Add pagination"));
    }

    #[test]
    fn test_summary() {
        assert_eq!(
            completion_summary(&CompletionFacts::default()),
            "Workflow completed successfully"
        );
        let facts = CompletionFacts {
            workflow: Some("plan_build".into()),
            branch: Some("hermes/ab12cd34-add-pagination".into()),
            commits: 2,
            phases: vec!["plan".into(), "build".into()],
            ticket: None,
        };
        assert_eq!(
            completion_summary(&facts),
            "• Workflow: plan_build\n• Branch: hermes/ab12cd34-add-pagination\n• Commits: 2\n• Phases: plan, build"
        );
    }
}
