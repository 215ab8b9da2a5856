//! # hermes-task
//!
//! External-process layer for Hermes: everything the worker launches.
//!
//! ## Features
//!
//! - Process execution with explicit environments and graceful timeouts
//! - **Structured output parser** for the agent's stream-json transcript
//! - **Agent invoker** (Claude Code CLI) behind the [`Agent`] trait
//! - **Repository state manager** with recovery-by-recreation
//! - Workspace layout (working copies, transcripts)

pub mod agent;
pub mod executor;
pub mod git;
pub mod workspace;

// Agent
pub use agent::{
    Agent, AgentPromptRequest, AgentPromptResult, ClaudeInvoker, ResultEvent, TranscriptSummary,
};

// Executor
pub use executor::{ExecError, ProcessOutput, ProcessSpec, StdoutTarget, TimeoutPolicy};

// Git
pub use git::{
    GitError, GitOps, Provisioning, ReadyRepository, RepositoryManager, RepositoryProvisioner,
};

// Workspace
pub use workspace::{remove_working_copy, validate_short_name, WorkspaceLayout};
