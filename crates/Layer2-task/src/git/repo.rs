//! Repository state manager
//!
//! Brings a working copy to a known-good state, recovering by recreation:
//!
//! ```text
//!   Absent ──clone──────────────────────────────┐
//!     ▲                                         ▼
//!     │ remove dir        fetch/checkout/ff   Ready
//!   Recovering ◄──any failure── Present ────────┘
//! ```
//!
//! A clone that fails on the Absent path, or the re-clone after recovery,
//! is the only error callers ever see.

use super::ops::{GitError, GitOps};
use super::remote::{authenticated_url, normalize_remote, redact};
use async_trait::async_trait;
use hermes_foundation::{Error, Result, Secret, WorkerConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// How a call reached Ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioning {
    /// Directory was absent and got cloned
    Cloned,
    /// Existing copy was brought up to date in place
    Updated,
    /// Existing copy was broken and got re-cloned
    Recovered,
}

/// A working copy in the Ready state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyRepository {
    pub path: PathBuf,
    pub branch: String,
    pub head: String,
    /// HEAD before an in-place update
    pub previous_head: Option<String>,
    pub provisioning: Provisioning,
}

impl ReadyRepository {
    /// Whether an in-place update moved HEAD
    pub fn head_moved(&self) -> bool {
        match self.provisioning {
            Provisioning::Updated => self.previous_head.as_deref() != Some(self.head.as_str()),
            Provisioning::Cloned | Provisioning::Recovered => true,
        }
    }
}

/// Makes a working copy Ready, and records agent work on top of it
#[async_trait]
pub trait RepositoryProvisioner: Send + Sync {
    async fn ensure_ready(&self, remote_url: &str, target: &Path) -> Result<ReadyRepository>;

    /// Create `branch` at HEAD of a Ready copy and switch to it
    async fn start_branch(&self, dir: &Path, branch: &str) -> Result<()>;

    /// Commit every change in the working tree; `None` when it was clean
    async fn commit_all(&self, dir: &Path, message: &str) -> Result<Option<String>>;

    /// Push `branch` to origin
    async fn push_branch(&self, dir: &Path, branch: &str) -> Result<()>;

    /// Switch back to `branch`, leaving the working branch intact
    async fn switch_branch(&self, dir: &Path, branch: &str) -> Result<()>;
}

// ============================================================================
// Repository Manager
// ============================================================================

#[derive(Debug, Clone)]
pub struct RepositoryManager {
    git: GitOps,
    token: Option<Secret>,
    git_timeout: Duration,
    clone_timeout: Duration,
}

impl Default for RepositoryManager {
    fn default() -> Self {
        Self::new(GitOps::default())
    }
}

impl RepositoryManager {
    pub fn new(git: GitOps) -> Self {
        Self {
            git,
            token: None,
            git_timeout: Duration::from_secs(60),
            clone_timeout: Duration::from_secs(120),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        let git = GitOps::new(config.git_binary.clone())
            .with_identity(config.git_author_name.clone(), config.git_author_email.clone());
        let mut manager = Self::new(git)
            .with_timeouts(config.git_timeout(), config.clone_timeout());
        manager.token = config.git_token.clone();
        manager
    }

    pub fn with_token(mut self, token: Secret) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_timeouts(mut self, git_timeout: Duration, clone_timeout: Duration) -> Self {
        self.git_timeout = git_timeout;
        self.clone_timeout = clone_timeout;
        self
    }

    pub fn git(&self) -> &GitOps {
        &self.git
    }

    /// Absent → clone → Ready
    async fn clone_fresh(&self, url: &str, target: &Path) -> std::result::Result<ReadyRepository, GitError> {
        if let Err(e) = self.git.clone_repo(url, target, self.clone_timeout).await {
            // a partial clone must not be mistaken for Present next time
            let _ = tokio::fs::remove_dir_all(target).await;
            return Err(e);
        }
        let branch = self.git.default_branch(target, self.git_timeout).await?;
        let head = self.git.rev_parse(target, "HEAD", self.git_timeout).await?;
        Ok(ReadyRepository {
            path: target.to_path_buf(),
            branch,
            head,
            previous_head: None,
            provisioning: Provisioning::Cloned,
        })
    }

    /// Present → fetch, force the default branch, fast-forward, verify
    async fn update_in_place(&self, url: &str, target: &Path) -> std::result::Result<ReadyRepository, GitError> {
        let timeout = self.git_timeout;

        // A plain directory nested inside some other checkout is not ours.
        let toplevel = self.git.toplevel(target, timeout).await?;
        if !same_dir(&toplevel, target) {
            return Err(GitError::NotARepository(target.to_path_buf()));
        }

        let previous_head = self.git.rev_parse(target, "HEAD", timeout).await.ok();

        self.git.set_remote_url(target, url, timeout).await?;
        self.git.fetch(target, timeout).await?;
        let branch = self.git.default_branch(target, timeout).await?;
        self.git.checkout(target, &branch, timeout).await?;
        self.git.fast_forward(target, &branch, timeout).await?;

        if !self.git.is_clean(target, timeout).await? {
            return Err(GitError::DirtyWorkingTree);
        }
        let head = self.git.rev_parse(target, "HEAD", timeout).await?;
        let upstream = self
            .git
            .rev_parse(target, &format!("origin/{}", branch), timeout)
            .await?;
        if head != upstream {
            return Err(GitError::NotAtUpstream { head, upstream });
        }

        Ok(ReadyRepository {
            path: target.to_path_buf(),
            branch,
            head,
            previous_head,
            provisioning: Provisioning::Updated,
        })
    }
}

#[async_trait]
impl RepositoryProvisioner for RepositoryManager {
    async fn ensure_ready(&self, remote_url: &str, target: &Path) -> Result<ReadyRepository> {
        let url = normalize_remote(remote_url);
        let auth_url = authenticated_url(&url, self.token.as_ref());
        let display_url = redact(&url).into_owned();

        if !target.exists() {
            info!(remote = %display_url, target = %target.display(), "Cloning repository");
            return self.clone_fresh(&auth_url, target).await.map_err(|e| {
                warn!(remote = %display_url, "Clone failed: {}", e);
                Error::setup(e.to_string())
            });
        }

        match self.update_in_place(&auth_url, target).await {
            Ok(ready) => {
                info!(
                    target = %target.display(),
                    branch = %ready.branch,
                    head_moved = ready.head_moved(),
                    "Repository up to date"
                );
                return Ok(ready);
            }
            Err(e) => {
                warn!(
                    target = %target.display(),
                    "Working copy unusable, recovering by re-clone: {}", e
                );
            }
        }

        // Recovering
        if let Err(e) = tokio::fs::remove_dir_all(target).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(target = %target.display(), "Cannot remove working copy: {}", e);
                return Err(Error::setup(format!("cannot remove {}: {}", target.display(), e)));
            }
        }

        match self.clone_fresh(&auth_url, target).await {
            Ok(mut ready) => {
                ready.provisioning = Provisioning::Recovered;
                info!(target = %target.display(), branch = %ready.branch, "Repository recovered");
                Ok(ready)
            }
            Err(e) => {
                warn!(remote = %display_url, "Recovery clone failed: {}", e);
                Err(Error::setup(e.to_string()))
            }
        }
    }

    async fn start_branch(&self, dir: &Path, branch: &str) -> Result<()> {
        self.git
            .create_branch(dir, branch, self.git_timeout)
            .await
            .map_err(git_error)?;
        info!(dir = %dir.display(), branch, "Working branch created");
        Ok(())
    }

    async fn commit_all(&self, dir: &Path, message: &str) -> Result<Option<String>> {
        let commit = self
            .git
            .commit_all(dir, message, self.git_timeout)
            .await
            .map_err(git_error)?;
        if let Some(sha) = &commit {
            info!(dir = %dir.display(), commit = %sha, "Committed agent changes");
        }
        Ok(commit)
    }

    async fn push_branch(&self, dir: &Path, branch: &str) -> Result<()> {
        // network transfer, bounded like clone
        self.git
            .push(dir, branch, self.clone_timeout)
            .await
            .map_err(git_error)
    }

    async fn switch_branch(&self, dir: &Path, branch: &str) -> Result<()> {
        self.git
            .checkout(dir, branch, self.git_timeout)
            .await
            .map_err(git_error)
    }
}

fn git_error(e: GitError) -> Error {
    Error::Git(e.to_string())
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
