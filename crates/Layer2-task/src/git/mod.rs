//! Git module - working copies of remote repositories
//!
//! - `ops.rs`: async runner over the `git` binary
//! - `remote.rs`: `owner/repo` expansion, token auth, credential redaction
//! - `repo.rs`: Repository state manager (clone / update / recover)

pub mod ops;
pub mod remote;
pub mod repo;

pub use ops::{GitError, GitOps};
pub use remote::{authenticated_url, normalize_remote, redact};
pub use repo::{Provisioning, ReadyRepository, RepositoryManager, RepositoryProvisioner};
