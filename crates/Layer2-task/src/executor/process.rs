//! Process executor - one external command with an explicit environment
//!
//! Features:
//! - Explicit environment (the parent environment is never inherited)
//! - stdout captured in memory or redirected straight into a file
//! - Own process group on Unix, so a timeout takes the children down too
//! - Graceful shutdown with SIGTERM -> SIGKILL escalation

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long to wait for pipe readers once the process is gone
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ExecError {
    /// Binary missing, permission denied, bad working directory
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// stdout redirect target could not be opened
    #[error("failed to open output file {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecError {
    pub fn is_launch_failure(&self) -> bool {
        matches!(self, ExecError::Launch { .. })
    }
}

// ============================================================================
// Timeout Policy
// ============================================================================

/// Timeout policy for one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutPolicy {
    /// No timeout
    None,
    /// Kill immediately when exceeded
    Hard(Duration),
    /// SIGTERM at `soft_timeout`, SIGKILL at `soft_timeout + grace_period`
    Graceful {
        soft_timeout: Duration,
        grace_period: Duration,
    },
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::Hard(Duration::from_secs(60))
    }
}

impl TimeoutPolicy {
    /// Create a hard timeout from seconds
    pub fn hard_secs(secs: u64) -> Self {
        Self::Hard(Duration::from_secs(secs))
    }

    /// Create a graceful timeout
    pub fn graceful(soft_timeout: Duration, grace_period: Duration) -> Self {
        Self::Graceful {
            soft_timeout,
            grace_period,
        }
    }

    /// When the process is first asked to stop
    pub fn deadline(&self) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Hard(d) => Some(*d),
            Self::Graceful { soft_timeout, .. } => Some(*soft_timeout),
        }
    }

    /// Get the maximum timeout duration
    pub fn max_duration(&self) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Hard(d) => Some(*d),
            Self::Graceful {
                soft_timeout,
                grace_period,
            } => Some(*soft_timeout + *grace_period),
        }
    }

    fn grace_period(&self) -> Duration {
        match self {
            Self::Graceful { grace_period, .. } => *grace_period,
            _ => Duration::ZERO,
        }
    }
}

// ============================================================================
// Process Spec
// ============================================================================

/// Where stdout goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdoutTarget {
    /// Collected into [`ProcessOutput::stdout`]
    Capture,
    /// Written straight to a file (created or truncated)
    File(PathBuf),
}

/// Description of one external command
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// The complete environment of the child
    pub env: BTreeMap<String, String>,
    pub stdout: StdoutTarget,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            stdout: StdoutTarget::Capture,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, vars: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn stdout_to_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = StdoutTarget::File(path.into());
        self
    }

    /// Shell-quoted command line, for logs
    pub fn command_line(&self) -> String {
        let words = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        shlex::try_join(words).unwrap_or_else(|_| self.program.clone())
    }
}

// ============================================================================
// Process Output
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    /// Empty when stdout went to a file
    pub stdout: String,
    /// ANSI escapes stripped
    pub stderr: String,
    /// Deadline expired and the process group was terminated
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Run `spec` to completion under `policy`.
///
/// Non-zero exits and timeouts are reported through [`ProcessOutput`]; only
/// launch and IO problems are errors.
pub async fn run(spec: &ProcessSpec, policy: &TimeoutPolicy) -> Result<ProcessOutput, ExecError> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .env_clear()
        .envs(&spec.env)
        .stdin(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &spec.working_dir {
        cmd.current_dir(dir);
    }

    match &spec.stdout {
        StdoutTarget::Capture => {
            cmd.stdout(Stdio::piped());
        }
        StdoutTarget::File(path) => {
            let file = std::fs::File::create(path).map_err(|source| ExecError::Output {
                path: path.clone(),
                source,
            })?;
            cmd.stdout(Stdio::from(file));
        }
    }

    #[cfg(unix)]
    cmd.process_group(0);

    debug!(command = %spec.command_line(), "Spawning process");

    let started_at = Instant::now();
    let mut child = cmd.spawn().map_err(|source| ExecError::Launch {
        program: spec.program.clone(),
        source,
    })?;

    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    let (status, timed_out) = match policy.deadline() {
        None => (child.wait().await?, false),
        Some(deadline) => match tokio::time::timeout(deadline, child.wait()).await {
            Ok(status) => (status?, false),
            Err(_) => {
                warn!(
                    program = %spec.program,
                    timeout_secs = deadline.as_secs_f64(),
                    "Process deadline exceeded, terminating process group"
                );
                (terminate(&mut child, policy.grace_period()).await?, true)
            }
        },
    };

    let (stdout, stderr) = futures::future::join(drain(stdout_reader), drain(stderr_reader)).await;
    let stderr = String::from_utf8_lossy(&strip_ansi_escapes::strip(stderr)).into_owned();

    let output = ProcessOutput {
        exit_code: status.code(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr,
        timed_out,
        elapsed: started_at.elapsed(),
    };

    debug!(
        program = %spec.program,
        exit_code = ?output.exit_code,
        timed_out = output.timed_out,
        elapsed_ms = output.elapsed.as_millis() as u64,
        "Process finished"
    );

    Ok(output)
}

fn spawn_reader<R>(mut stream: R) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf).await;
        buf
    })
}

/// A grandchild that escaped the process group can keep a pipe open forever
async fn drain(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    let Some(mut handle) = reader else {
        return Vec::new();
    };
    match tokio::time::timeout(READER_DRAIN_TIMEOUT, &mut handle).await {
        Ok(Ok(buf)) => buf,
        Ok(Err(_)) => Vec::new(),
        Err(_) => {
            handle.abort();
            Vec::new()
        }
    }
}

/// SIGTERM the group, wait out the grace period, then SIGKILL
async fn terminate(
    child: &mut Child,
    grace_period: Duration,
) -> std::io::Result<std::process::ExitStatus> {
    if !grace_period.is_zero() {
        signal_group(child, Signal::Terminate);
        if let Ok(status) = tokio::time::timeout(grace_period, child.wait()).await {
            return status;
        }
        debug!("Grace period expired, killing process group");
    }

    signal_group(child, Signal::Kill);
    let _ = child.start_kill();
    child.wait().await
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn signal_group(child: &Child, signal: Signal) {
    let Some(pid) = child.id() else {
        return;
    };
    let sig = match signal {
        Signal::Terminate => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // The child is its own group leader (process_group(0)), so pgid == pid.
    let rc = unsafe { libc::killpg(pid as libc::pid_t, sig) };
    if rc != 0 {
        debug!(pid, ?signal, "killpg failed: {}", std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn signal_group(_child: &Child, signal: Signal) {
    debug!(?signal, "Process groups are not supported here, falling back to kill");
}
