//! Agent invoker - runs the agent CLI once per prompt
//!
//! The CLI is launched in non-interactive stream-json mode with stdout
//! redirected into the transcript file:
//!
//! ```text
//! claude -p <prompt> --model <model> --output-format stream-json --verbose \
//!        [--dangerously-skip-permissions]
//! ```

use super::transcript;
use super::types::{AgentPromptRequest, AgentPromptResult};
use crate::executor::{self, ProcessSpec, TimeoutPolicy};
use async_trait::async_trait;
use hermes_foundation::strings::tail_lines;
use hermes_foundation::{Secret, WorkerConfig};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Environment variable carrying the correlation id into the agent
pub const CORRELATION_ENV: &str = "HERMES_CORRELATION_ID";

/// PATH handed to children when the worker itself has none
const FALLBACK_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Grace period between SIGTERM and SIGKILL
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Runs one prompt to completion. Failures are reported in the result.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn prompt(&self, request: &AgentPromptRequest) -> AgentPromptResult;
}

// ============================================================================
// Claude CLI
// ============================================================================

/// [`Agent`] backed by the Claude Code CLI
#[derive(Debug, Clone)]
pub struct ClaudeInvoker {
    binary: String,
    api_key: Option<Secret>,
    timeout: Duration,
    grace_period: Duration,
    base_env: BTreeMap<String, String>,
}

impl ClaudeInvoker {
    pub fn new(binary: impl Into<String>) -> Self {
        let mut base_env = BTreeMap::new();
        base_env.insert(
            "PATH".to_string(),
            std::env::var("PATH").unwrap_or_else(|_| FALLBACK_PATH.to_string()),
        );
        if let Some(home) = std::env::var_os("HOME").or_else(|| dirs::home_dir().map(Into::into)) {
            base_env.insert("HOME".to_string(), home.to_string_lossy().into_owned());
        }

        Self {
            binary: binary.into(),
            api_key: None,
            timeout: Duration::from_secs(300),
            grace_period: DEFAULT_GRACE_PERIOD,
            base_env,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        let mut invoker = Self::new(config.agent_binary.clone()).with_timeout(config.agent_timeout());
        invoker.api_key = config.agent_api_key.clone();
        invoker
    }

    pub fn with_api_key(mut self, key: Secret) -> Self {
        self.api_key = Some(key);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Override one of the inherited base variables (PATH, HOME)
    pub fn with_base_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.base_env.insert(key.into(), value.into());
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Whether the binary resolves on the invoker's PATH
    pub fn binary_available(&self) -> bool {
        let path = self.base_env.get("PATH").cloned().unwrap_or_default();
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        which::which_in(&self.binary, Some(path), cwd).is_ok()
    }

    /// The complete child environment for one request
    fn environment(&self, request: &AgentPromptRequest) -> BTreeMap<String, String> {
        let mut env = self.base_env.clone();
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            env.insert("ANTHROPIC_API_KEY".to_string(), key.expose().to_string());
        }
        env.insert(CORRELATION_ENV.to_string(), request.correlation_id.clone());
        env
    }

    fn build_spec(&self, request: &AgentPromptRequest) -> ProcessSpec {
        let mut spec = ProcessSpec::new(&self.binary)
            .arg("-p")
            .arg(&request.prompt)
            .args(["--output-format", "stream-json", "--verbose"]);
        if !request.model.is_empty() {
            spec = spec.args(["--model", request.model.as_str()]);
        }
        if request.allow_unattended {
            spec = spec.arg("--dangerously-skip-permissions");
        }
        spec.working_dir(&request.working_directory)
            .envs(&self.environment(request))
            .stdout_to_file(&request.transcript_path)
    }

    /// Make sure the transcript exists before anything can fail
    async fn prepare_transcript(request: &AgentPromptRequest) -> std::io::Result<()> {
        if let Some(parent) = request.transcript_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::File::create(&request.transcript_path).await?;
        Ok(())
    }
}

#[async_trait]
impl Agent for ClaudeInvoker {
    async fn prompt(&self, request: &AgentPromptRequest) -> AgentPromptResult {
        let started_at = Instant::now();

        if let Err(e) = Self::prepare_transcript(request).await {
            warn!(
                transcript = %request.transcript_path.display(),
                "Cannot create transcript file: {}", e
            );
            return AgentPromptResult::failure("could not create the agent transcript file");
        }

        info!(
            correlation_id = %request.correlation_id,
            model = %request.model,
            cwd = %request.working_directory.display(),
            "Invoking agent"
        );

        let policy = TimeoutPolicy::graceful(self.timeout, self.grace_period);
        let output = match executor::run(&self.build_spec(request), &policy).await {
            Ok(output) => output,
            Err(e) => {
                warn!(binary = %self.binary, "Agent launch failed: {}", e);
                let mut result = AgentPromptResult::failure(format!("failed to launch agent: {}", e));
                result.duration = started_at.elapsed();
                return result;
            }
        };

        if !output.stderr.trim().is_empty() {
            debug!(
                correlation_id = %request.correlation_id,
                stderr = %tail_lines(&output.stderr, 20),
                "Agent stderr"
            );
        }

        let mut result = if output.timed_out {
            warn!(
                correlation_id = %request.correlation_id,
                transcript = %request.transcript_path.display(),
                "Agent timed out"
            );
            AgentPromptResult::failure(format!("agent timed out after {}s", self.timeout.as_secs()))
        } else {
            match transcript::parse_file(&request.transcript_path).await {
                Err(e) => {
                    warn!("Agent transcript unreadable: {}", e);
                    AgentPromptResult::failure("the agent transcript could not be read")
                }
                Ok(summary) => {
                    if summary.skipped_lines > 0 {
                        debug!(skipped = summary.skipped_lines, "Skipped malformed transcript lines");
                    }
                    let outcome = if summary.is_failure() {
                        AgentPromptResult::failure(summary.error_explanation())
                    } else if summary.result.is_none() && output.exit_code != Some(0) {
                        warn!(
                            exit_code = ?output.exit_code,
                            stderr = %tail_lines(&output.stderr, 5),
                            "Agent exited abnormally without a result"
                        );
                        AgentPromptResult::failure(match output.exit_code {
                            Some(code) => format!("agent exited with status {}", code),
                            None => "agent was terminated by a signal".to_string(),
                        })
                    } else if summary.is_empty() {
                        warn!(
                            transcript = %request.transcript_path.display(),
                            "Agent finished with an empty transcript"
                        );
                        let mut result = AgentPromptResult::success("");
                        result.empty_transcript = true;
                        result
                    } else {
                        AgentPromptResult::success(summary.output_text())
                    };
                    outcome.with_session_id(summary.session_id)
                }
            }
        };

        result.timed_out = output.timed_out;
        result.exit_code = output.exit_code;
        result.duration = started_at.elapsed();

        info!(
            correlation_id = %request.correlation_id,
            succeeded = result.succeeded,
            exit_code = ?result.exit_code,
            elapsed_ms = result.duration.as_millis() as u64,
            "Agent finished"
        );

        result
    }
}
