//! Structured output parser
//!
//! The agent CLI in stream-json mode writes one JSON event per line:
//!
//! ```text
//! {"type":"system","subtype":"init","session_id":"..."}
//! {"type":"assistant","message":{"content":[{"type":"text","text":"..."}]}}
//! {"type":"result","subtype":"success","is_error":false,"result":"...","session_id":"..."}
//! ```
//!
//! Content shape never makes parsing fail. Lines that are not JSON objects
//! (a truncated last line after a kill, stray log output) are skipped.

use hermes_foundation::strings::truncate_chars;
use hermes_foundation::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::io::BufRead;
use std::path::Path;
use tracing::debug;

/// Upper bound for an error explanation taken from the result text
const ERROR_EXPLANATION_LIMIT: usize = 500;

// ============================================================================
// Result Event
// ============================================================================

/// The terminal `result` event
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResultEvent {
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub num_turns: Option<u64>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
}

impl ResultEvent {
    /// `is_error`, or a subtype such as `error_max_turns` / `error_during_execution`
    pub fn is_failure(&self) -> bool {
        self.is_error
            || self
                .subtype
                .as_deref()
                .is_some_and(|s| s.starts_with("error"))
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Everything the invoker needs from one transcript
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptSummary {
    /// Last `result` event, if any
    pub result: Option<ResultEvent>,
    /// Text blocks of `assistant` events, in order
    pub assistant_texts: Vec<String>,
    /// First session id seen on any event
    pub session_id: Option<String>,
    /// Lines that parsed as JSON objects
    pub events: usize,
    /// Non-empty lines that did not
    pub skipped_lines: usize,
}

impl TranscriptSummary {
    /// Canonical output: the result text, else the joined assistant text
    pub fn output_text(&self) -> String {
        match self.result.as_ref().and_then(|r| r.result.as_deref()) {
            Some(text) => text.trim().to_string(),
            None => self.assistant_texts.join("\n").trim().to_string(),
        }
    }

    /// Neither a result event nor any assistant text
    pub fn is_empty(&self) -> bool {
        self.result.is_none() && self.assistant_texts.iter().all(|t| t.trim().is_empty())
    }

    pub fn is_failure(&self) -> bool {
        self.result.as_ref().is_some_and(ResultEvent::is_failure)
    }

    /// Human-readable description of a failed run, never a transcript dump
    pub fn error_explanation(&self) -> String {
        let Some(result) = &self.result else {
            return "agent produced no result".to_string();
        };
        match result.result.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => {
                truncate_chars(text, ERROR_EXPLANATION_LIMIT).into_owned()
            }
            _ => format!(
                "agent reported an error ({})",
                result.subtype.as_deref().unwrap_or("unknown")
            ),
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse transcript lines
pub fn parse_lines<I, S>(lines: I) -> TranscriptSummary
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut summary = TranscriptSummary::default();

    for line in lines {
        let line = line.as_ref().trim();
        if line.is_empty() {
            continue;
        }

        let event = match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(map)) => map,
            _ => {
                summary.skipped_lines += 1;
                continue;
            }
        };
        summary.events += 1;

        if summary.session_id.is_none() {
            if let Some(id) = event.get("session_id").and_then(Value::as_str) {
                summary.session_id = Some(id.to_string());
            }
        }

        match event.get("type").and_then(Value::as_str) {
            Some("result") => {
                match serde_json::from_value::<ResultEvent>(Value::Object(event)) {
                    Ok(result) => summary.result = Some(result),
                    Err(e) => {
                        debug!("Ignoring result event with unexpected shape: {}", e);
                        summary.skipped_lines += 1;
                    }
                }
            }
            Some("assistant") => {
                if let Some(message) = event.get("message") {
                    collect_text(message, &mut summary.assistant_texts);
                }
            }
            _ => {}
        }
    }

    if summary.session_id.is_none() {
        summary.session_id = summary.result.as_ref().and_then(|r| r.session_id.clone());
    }

    summary
}

/// `content` is either a plain string or a list of typed blocks
fn collect_text(message: &Value, out: &mut Vec<String>) {
    match message.get("content") {
        Some(Value::String(text)) => out.push(text.clone()),
        Some(Value::Array(blocks)) => {
            for block in blocks {
                if block.get("type").and_then(Value::as_str) == Some("text") {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        out.push(text.to_string());
                    }
                }
            }
        }
        _ => {}
    }
}

/// Parse from any buffered reader. Undecodable bytes are replaced, not fatal.
pub fn parse_reader<R: BufRead>(mut reader: R) -> Result<TranscriptSummary> {
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| Error::Parse(e.to_string()))?;
        if n == 0 {
            break;
        }
        lines.push(String::from_utf8_lossy(&buf).into_owned());
    }
    Ok(parse_lines(lines))
}

/// Parse a transcript file; fails only when the file cannot be read
pub async fn parse_file(path: &Path) -> Result<TranscriptSummary> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)))?;
    parse_reader(bytes.as_slice())
}
