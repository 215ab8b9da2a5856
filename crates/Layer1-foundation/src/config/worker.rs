//! Worker Config - 통합 설정
//!
//! Resolution order: defaults → JSON file → environment → CLI flags
//! (the last step lives in the binary).

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 설정 파일명
pub const WORKER_CONFIG_FILE: &str = "worker.json";

// ============================================================================
// Secret
// ============================================================================

/// Credential that never shows up in `Debug` output
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(<empty>)")
        } else {
            f.write_str("Secret(***)")
        }
    }
}

// ============================================================================
// Worker Config
// ============================================================================

/// Worker 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerConfig {
    /// Base directory; working copies live at `<workspace>/<requester>/<short_name>`
    pub workspace_dir: PathBuf,

    /// Agent CLI binary
    pub agent_binary: String,

    /// Model identifier passed to the agent
    pub agent_model: String,

    /// Agent credential, handed to the agent process only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_api_key: Option<Secret>,

    /// Hosting-provider token for private remotes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_token: Option<Secret>,

    /// git binary
    pub git_binary: String,

    /// Author of workflow commits
    pub git_author_name: String,
    pub git_author_email: String,

    /// Wall-clock bound for one agent run
    pub agent_timeout_secs: u64,

    /// Bound for checkout / fetch / pull
    pub git_timeout_secs: u64,

    /// Bound for clone
    pub clone_timeout_secs: u64,

    /// How long a task waits for another task holding the same repository
    pub lock_timeout_secs: u64,

    /// Upper bound on tasks in flight
    pub max_concurrent_tasks: usize,

    /// Extra publish attempts for terminal responses
    pub response_retries: u32,

    /// Character bound for persisted prime output
    pub prime_output_limit: usize,

    /// Fallback log filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from("/workspace"),
            agent_binary: "claude".to_string(),
            agent_model: "sonnet".to_string(),
            agent_api_key: None,
            git_token: None,
            git_binary: "git".to_string(),
            git_author_name: "Hermes Worker".to_string(),
            git_author_email: "hermes@localhost".to_string(),
            agent_timeout_secs: 300,
            git_timeout_secs: 60,
            clone_timeout_secs: 120,
            lock_timeout_secs: 5,
            max_concurrent_tasks: 4,
            response_retries: 3,
            prime_output_limit: 16 * 1024,
            log_level: "info".to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// 기본 설정 디렉토리 (~/.hermes/)
    pub fn default_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".hermes"))
            .ok_or_else(|| Error::Config("Cannot find home directory".to_string()))
    }

    /// File (if present) then process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_file(path)?,
            None => match Self::default_dir() {
                Ok(dir) => JsonStore::new(dir)
                    .load_optional::<WorkerConfig>(WORKER_CONFIG_FILE)?
                    .unwrap_or_default(),
                Err(_) => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// 특정 파일에서 로드
    pub fn load_file(path: &Path) -> Result<Self> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Config(format!("Invalid config path: {}", path.display())))?;
        JsonStore::new(dir).load(name)
    }

    /// Apply environment overrides through `lookup` (injectable for tests)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(*k))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };

        if let Some(v) = first(&["HERMES_WORKSPACE_DIR", "WORKSPACE_DIR"]) {
            self.workspace_dir = PathBuf::from(v);
        }
        if let Some(v) = first(&["HERMES_AGENT_BIN", "CLAUDE_CODE_PATH"]) {
            self.agent_binary = v;
        }
        if let Some(v) = first(&["HERMES_AGENT_MODEL", "CLAUDE_MODEL"]) {
            self.agent_model = v;
        }
        if let Some(v) = first(&["ANTHROPIC_API_KEY"]) {
            self.agent_api_key = Some(Secret::new(v));
        }
        if let Some(v) = first(&["GITHUB_TOKEN", "GITHUB_PAT"]) {
            self.git_token = Some(Secret::new(v));
        }
        if let Some(v) = first(&["HERMES_GIT_BIN"]) {
            self.git_binary = v;
        }
        if let Some(v) = first(&["HERMES_GIT_AUTHOR_NAME", "GIT_AUTHOR_NAME"]) {
            self.git_author_name = v;
        }
        if let Some(v) = first(&["HERMES_GIT_AUTHOR_EMAIL", "GIT_AUTHOR_EMAIL"]) {
            self.git_author_email = v;
        }
        if let Some(v) = first(&["LOG_LEVEL"]) {
            self.log_level = v.to_lowercase();
        }

        parse_into(&first(&["HERMES_AGENT_TIMEOUT_SECS"]), &mut self.agent_timeout_secs);
        parse_into(&first(&["HERMES_GIT_TIMEOUT_SECS"]), &mut self.git_timeout_secs);
        parse_into(&first(&["HERMES_CLONE_TIMEOUT_SECS"]), &mut self.clone_timeout_secs);
        parse_into(&first(&["HERMES_LOCK_TIMEOUT_SECS"]), &mut self.lock_timeout_secs);
        parse_into(&first(&["HERMES_MAX_CONCURRENT"]), &mut self.max_concurrent_tasks);
        parse_into(&first(&["HERMES_RESPONSE_RETRIES"]), &mut self.response_retries);
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.agent_api_key.as_ref().map_or(true, Secret::is_empty) {
            return Err(Error::Config(
                "ANTHROPIC_API_KEY is required for the agent".to_string(),
            ));
        }
        if self.max_concurrent_tasks == 0 {
            return Err(Error::Config("maxConcurrentTasks must be at least 1".to_string()));
        }
        for (name, secs) in [
            ("agentTimeoutSecs", self.agent_timeout_secs),
            ("gitTimeoutSecs", self.git_timeout_secs),
            ("cloneTimeoutSecs", self.clone_timeout_secs),
        ] {
            if secs == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }
        if self.workspace_dir.as_os_str().is_empty() {
            return Err(Error::Config("workspaceDir must not be empty".to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // Durations
    // ========================================================================

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_secs)
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    pub fn clone_timeout(&self) -> Duration {
        Duration::from_secs(self.clone_timeout_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn workspace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_dir = dir.into();
        self
    }

    pub fn agent_api_key(mut self, key: impl Into<String>) -> Self {
        self.agent_api_key = Some(Secret::new(key));
        self
    }

    pub fn max_concurrent_tasks(mut self, n: usize) -> Self {
        self.max_concurrent_tasks = n;
        self
    }
}

fn parse_into<T: std::str::FromStr>(raw: &Option<String>, slot: &mut T) {
    if let Some(raw) = raw {
        match raw.parse::<T>() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!(value = %raw, "Ignoring unparsable numeric setting"),
        }
    }
}
