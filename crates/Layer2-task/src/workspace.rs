//! Workspace layout
//!
//! ```text
//! <root>/
//!   <requester_id>/<short_name>/                       working copies
//!   .agents/<task_id>/<agent_name>/raw_output.jsonl    transcripts
//!   .state/                                            persisted records
//! ```

use hermes_foundation::strings::path_component;
use hermes_foundation::{Error, RequesterId, Result, TaskId};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Transcript file name inside an agent directory
pub const TRANSCRIPT_FILE: &str = "raw_output.jsonl";

#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Working copy of `(requester_id, short_name)`.
    ///
    /// `short_name` must already have passed [`validate_short_name`].
    pub fn repo_dir(&self, requester_id: &RequesterId, short_name: &str) -> PathBuf {
        self.root
            .join(&*path_component(requester_id.as_str()))
            .join(short_name)
    }

    pub fn transcript_path(&self, task_id: &TaskId, agent_name: &str) -> PathBuf {
        self.root
            .join(".agents")
            .join(&*path_component(task_id.as_str()))
            .join(&*path_component(agent_name))
            .join(TRANSCRIPT_FILE)
    }
}

/// Reject names that would escape the requester's directory
pub fn validate_short_name(short_name: &str) -> Result<()> {
    let valid = !short_name.is_empty()
        && short_name.len() <= 100
        && !short_name.starts_with('.')
        && short_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "invalid repository name '{}': use letters, digits, '-', '_' or '.'",
            short_name
        )))
    }
}

/// Delete a working copy; a missing directory is not an error
pub async fn remove_working_copy(dir: &Path) -> Result<bool> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {
            debug!(dir = %dir.display(), "Removed working copy");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let layout = WorkspaceLayout::new("/ws");
        assert_eq!(
            layout.repo_dir(&RequesterId::new("42"), "api"),
            PathBuf::from("/ws/42/api")
        );
        assert_eq!(
            layout.transcript_path(&TaskId::new("t-1"), "prime"),
            PathBuf::from("/ws/.agents/t-1/prime/raw_output.jsonl")
        );
    }

    #[test]
    fn test_requester_cannot_escape() {
        let layout = WorkspaceLayout::new("/ws");
        let dir = layout.repo_dir(&RequesterId::new("../etc"), "api");
        assert_eq!(dir, PathBuf::from("/ws/%2E%2E%2Fetc/api"));
    }

    #[test]
    fn test_similar_requesters_get_distinct_dirs() {
        let layout = WorkspaceLayout::new("/ws");
        let dotted = layout.repo_dir(&RequesterId::new("alice.smith"), "api");
        let underscored = layout.repo_dir(&RequesterId::new("alice_smith"), "api");
        assert_ne!(dotted, underscored);
        assert_eq!(underscored, PathBuf::from("/ws/alice_smith/api"));

        assert_ne!(
            layout.transcript_path(&TaskId::new("t.1"), "prime"),
            layout.transcript_path(&TaskId::new("t_1"), "prime")
        );
    }

    #[test]
    fn test_short_name_validation() {
        assert!(validate_short_name("backend-api").is_ok());
        assert!(validate_short_name("my.repo_2").is_ok());
        for bad in ["", "..", ".git", "a/b", "a b", "../x"] {
            assert!(validate_short_name(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("repo");
        std::fs::create_dir_all(target.join("src")).unwrap();
        std::fs::write(target.join("src/main.rs"), "fn main() {}").unwrap();

        assert!(remove_working_copy(&target).await.unwrap());
        assert!(!target.exists());
        assert!(!remove_working_copy(&target).await.unwrap());
    }
}
