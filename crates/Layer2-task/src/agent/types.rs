//! Agent invocation contract

use hermes_foundation::Error;
use std::path::PathBuf;
use std::time::Duration;

/// One prompt for the agent
#[derive(Debug, Clone)]
pub struct AgentPromptRequest {
    pub prompt: String,
    /// Passed to the agent environment; usually the task id
    pub correlation_id: String,
    pub working_directory: PathBuf,
    pub model: String,
    /// Skip interactive confirmations
    pub allow_unattended: bool,
    /// Raw transcript destination; always exists after the call
    pub transcript_path: PathBuf,
}

impl AgentPromptRequest {
    pub fn new(
        prompt: impl Into<String>,
        correlation_id: impl Into<String>,
        working_directory: impl Into<PathBuf>,
        transcript_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            correlation_id: correlation_id.into(),
            working_directory: working_directory.into(),
            model: String::new(),
            allow_unattended: true,
            transcript_path: transcript_path.into(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_allow_unattended(mut self, allow: bool) -> Self {
        self.allow_unattended = allow;
        self
    }
}

/// Outcome of one agent run.
///
/// When `succeeded` is false, `output_text` is a short explanation suitable
/// for the requester.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentPromptResult {
    pub output_text: String,
    pub succeeded: bool,
    pub session_id: Option<String>,
    /// Exit 0 with nothing in the transcript
    pub empty_transcript: bool,
    pub timed_out: bool,
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl AgentPromptResult {
    pub fn success(output_text: impl Into<String>) -> Self {
        Self {
            output_text: output_text.into(),
            succeeded: true,
            ..Default::default()
        }
    }

    pub fn failure(explanation: impl Into<String>) -> Self {
        Self {
            output_text: explanation.into(),
            succeeded: false,
            ..Default::default()
        }
    }

    pub fn with_session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    /// [`Error::Agent`] with the explanation, or `None` for a successful run
    pub fn error(&self) -> Option<Error> {
        (!self.succeeded).then(|| Error::Agent(self.output_text.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_run_is_agent_error() {
        assert!(AgentPromptResult::success("done").error().is_none());

        let err = AgentPromptResult::failure("agent timed out after 300s")
            .error()
            .unwrap();
        assert!(matches!(err, Error::Agent(_)));
        assert_eq!(err.user_message(), "Agent failed: agent timed out after 300s");
    }
}
