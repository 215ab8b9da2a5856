//! Git Operations
//!
//! Thin async wrapper over the `git` binary. Only exit codes and text output
//! are interpreted; there is no library binding.

use super::remote::redact;
use crate::executor::{self, ExecError, ProcessSpec, TimeoutPolicy};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git {command} failed (exit {exit_code:?}): {stderr}")]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("git {command} timed out after {secs}s")]
    TimedOut { command: String, secs: u64 },

    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("Uncommitted changes exist")]
    DirtyWorkingTree,

    #[error("HEAD {head} does not match {upstream}")]
    NotAtUpstream { head: String, upstream: String },

    #[error("Default branch not found")]
    DefaultBranchNotFound,

    #[error("{0}")]
    Exec(#[from] ExecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Git Operations
// ============================================================================

/// Git command runner with a fixed, minimal environment
#[derive(Debug, Clone)]
pub struct GitOps {
    binary: String,
    env: BTreeMap<String, String>,
}

impl Default for GitOps {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitOps {
    pub fn new(binary: impl Into<String>) -> Self {
        let mut env = BTreeMap::new();
        env.insert(
            "PATH".to_string(),
            std::env::var("PATH").unwrap_or_else(|_| "/usr/local/bin:/usr/bin:/bin".to_string()),
        );
        if let Ok(home) = std::env::var("HOME") {
            env.insert("HOME".to_string(), home);
        }
        // Never block on a credential prompt; keep messages parseable.
        env.insert("GIT_TERMINAL_PROMPT".to_string(), "0".to_string());
        env.insert("LC_ALL".to_string(), "C".to_string());

        Self {
            binary: binary.into(),
            env,
        }
        .with_identity("Hermes Worker", "hermes@localhost")
    }

    /// Author and committer of commits made through this runner
    pub fn with_identity(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        let (name, email) = (name.into(), email.into());
        for role in ["AUTHOR", "COMMITTER"] {
            self.env.insert(format!("GIT_{}_NAME", role), name.clone());
            self.env.insert(format!("GIT_{}_EMAIL", role), email.clone());
        }
        self
    }

    /// Run a git command, returning trimmed stdout
    pub async fn run_git(
        &self,
        cwd: Option<&Path>,
        args: &[&str],
        timeout: Duration,
    ) -> Result<String, GitError> {
        let mut spec = ProcessSpec::new(&self.binary)
            .args(args.iter().copied())
            .envs(&self.env);
        if let Some(dir) = cwd {
            spec = spec.working_dir(dir);
        }

        let command = redact(&args.join(" ")).into_owned();
        debug!(command = %command, cwd = ?cwd, "git");

        let output = executor::run(&spec, &TimeoutPolicy::Hard(timeout)).await?;

        if output.timed_out {
            return Err(GitError::TimedOut {
                command,
                secs: timeout.as_secs(),
            });
        }
        if output.success() {
            Ok(output.stdout.trim().to_string())
        } else {
            Err(GitError::CommandFailed {
                command,
                exit_code: output.exit_code,
                stderr: redact(output.stderr.trim()).into_owned(),
            })
        }
    }

    /// `git clone` into `target` (which must not exist or be empty)
    pub async fn clone_repo(
        &self,
        url: &str,
        target: &Path,
        timeout: Duration,
    ) -> Result<(), GitError> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let target_str = target.to_string_lossy();
        self.run_git(None, &["clone", "--quiet", url, target_str.as_ref()], timeout)
            .await
            .map(|_| ())
    }

    /// Top-level directory of the repository containing `dir`
    pub async fn toplevel(&self, dir: &Path, timeout: Duration) -> Result<PathBuf, GitError> {
        self.run_git(Some(dir), &["rev-parse", "--show-toplevel"], timeout)
            .await
            .map(PathBuf::from)
            .map_err(|_| GitError::NotARepository(dir.to_path_buf()))
    }

    pub async fn set_remote_url(
        &self,
        dir: &Path,
        url: &str,
        timeout: Duration,
    ) -> Result<(), GitError> {
        self.run_git(Some(dir), &["remote", "set-url", "origin", url], timeout)
            .await
            .map(|_| ())
    }

    pub async fn fetch(&self, dir: &Path, timeout: Duration) -> Result<(), GitError> {
        self.run_git(Some(dir), &["fetch", "--quiet", "--prune", "origin"], timeout)
            .await
            .map(|_| ())
    }

    /// Branch `origin/HEAD` points to
    pub async fn default_branch(&self, dir: &Path, timeout: Duration) -> Result<String, GitError> {
        let args = ["symbolic-ref", "--quiet", "--short", "refs/remotes/origin/HEAD"];
        let head = match self.run_git(Some(dir), &args, timeout).await {
            Ok(head) => head,
            Err(_) => {
                // origin/HEAD is only recorded by clone; ask the remote.
                self.run_git(Some(dir), &["remote", "set-head", "origin", "--auto"], timeout)
                    .await?;
                self.run_git(Some(dir), &args, timeout).await?
            }
        };
        head.strip_prefix("origin/")
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .ok_or(GitError::DefaultBranchNotFound)
    }

    pub async fn checkout(&self, dir: &Path, branch: &str, timeout: Duration) -> Result<(), GitError> {
        self.run_git(Some(dir), &["checkout", "--quiet", branch], timeout)
            .await
            .map(|_| ())
    }

    /// Fast-forward the current branch to its remote counterpart
    pub async fn fast_forward(
        &self,
        dir: &Path,
        branch: &str,
        timeout: Duration,
    ) -> Result<(), GitError> {
        let upstream = format!("origin/{}", branch);
        self.run_git(Some(dir), &["merge", "--ff-only", "--quiet", upstream.as_str()], timeout)
            .await
            .map(|_| ())
    }

    pub async fn rev_parse(&self, dir: &Path, rev: &str, timeout: Duration) -> Result<String, GitError> {
        self.run_git(Some(dir), &["rev-parse", "--verify", "--quiet", rev], timeout)
            .await
    }

    /// `checkout -b`; an existing branch of that name is checked out instead
    pub async fn create_branch(&self, dir: &Path, branch: &str, timeout: Duration) -> Result<(), GitError> {
        match self
            .run_git(Some(dir), &["checkout", "--quiet", "-b", branch], timeout)
            .await
        {
            Ok(_) => Ok(()),
            Err(GitError::CommandFailed { ref stderr, .. }) if stderr.contains("already exists") => {
                self.checkout(dir, branch, timeout).await
            }
            Err(e) => Err(e),
        }
    }

    /// Stage everything and commit; `None` when there was nothing to commit
    pub async fn commit_all(
        &self,
        dir: &Path,
        message: &str,
        timeout: Duration,
    ) -> Result<Option<String>, GitError> {
        if self.is_clean(dir, timeout).await? {
            return Ok(None);
        }
        self.run_git(Some(dir), &["add", "--all"], timeout).await?;
        self.run_git(Some(dir), &["commit", "--quiet", "--no-verify", "-m", message], timeout)
            .await?;
        self.rev_parse(dir, "HEAD", timeout).await.map(Some)
    }

    /// Push `branch` to origin and track it
    pub async fn push(&self, dir: &Path, branch: &str, timeout: Duration) -> Result<(), GitError> {
        self.run_git(Some(dir), &["push", "--quiet", "--set-upstream", "origin", branch], timeout)
            .await
            .map(|_| ())
    }

    /// Working tree has no staged, unstaged or untracked changes
    pub async fn is_clean(&self, dir: &Path, timeout: Duration) -> Result<bool, GitError> {
        let status = self
            .run_git(Some(dir), &["status", "--porcelain=v1"], timeout)
            .await?;
        Ok(status.is_empty())
    }
}
