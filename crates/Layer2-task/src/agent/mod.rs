//! Agent module - AI agent subprocess and its transcript
//!
//! - `transcript.rs`: line-delimited JSON transcript → [`TranscriptSummary`]
//! - `invoker.rs`: [`Agent`] trait + [`ClaudeInvoker`]
//! - `types.rs`: request / result contract

pub mod invoker;
pub mod transcript;
pub mod types;

pub use invoker::{Agent, ClaudeInvoker, CORRELATION_ENV};
pub use transcript::{parse_file, parse_lines, parse_reader, ResultEvent, TranscriptSummary};
pub use types::{AgentPromptRequest, AgentPromptResult};
