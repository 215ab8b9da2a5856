//! Message Filter - category × reporting level
//!
//! | level    | error | workflow | technical | agent | "started" |
//! |----------|-------|----------|-----------|-------|-----------|
//! | minimal  |   ✓   |          |           |       |           |
//! | basic    |   ✓   |    ✓     |           |       |           |
//! | detailed |   ✓   |    ✓     |     ✓     |       |     ✓     |
//! | verbose  |   ✓   |    ✓     |     ✓     |   ✓   |     ✓     |
//!
//! Terminal responses are never filtered.

use hermes_foundation::{MessageCategory, Outbound, ReportingLevel, StatusMessage};

/// Whether a status of `category` reaches a requester at `level`
pub fn should_emit(category: MessageCategory, level: ReportingLevel) -> bool {
    use MessageCategory::*;
    use ReportingLevel::*;

    match (level, category) {
        (_, Error) => true,
        (Minimal, _) => false,
        (Basic, Workflow) => true,
        (Basic, _) => false,
        (Detailed, Workflow | Technical) => true,
        (Detailed, Agent) => false,
        (Verbose, _) => true,
    }
}

/// The "started" notice duplicates the front-end's own acknowledgment
pub fn should_emit_started(level: ReportingLevel) -> bool {
    level >= ReportingLevel::Detailed
}

/// Filter decision for one status message
pub fn permits_status(status: &StatusMessage, level: ReportingLevel) -> bool {
    if status.started {
        should_emit(MessageCategory::Workflow, level) && should_emit_started(level)
    } else {
        should_emit(status.category, level)
    }
}

/// Filter decision for any outbound message
pub fn permits(message: &Outbound, level: ReportingLevel) -> bool {
    match message {
        Outbound::Response(_) => true,
        Outbound::Status(status) => permits_status(status, level),
    }
}
