//! Executor module - running external programs
//!
//! Everything the worker launches (git, the agent CLI) goes through
//! [`process::run`], which owns timeouts and process-group cleanup.

pub mod process;

pub use process::{run, ExecError, ProcessOutput, ProcessSpec, StdoutTarget, TimeoutPolicy};
