//! Message channel - task intake and outbound egress
//!
//! Intake yields raw messages so that undecodable tasks can still be
//! answered when their correlation fields survive.

mod jsonl;
mod memory;

pub use jsonl::{spawn_line_reader, JsonLinesSink, JsonLinesSource};
pub use memory::{memory_channel, MemorySink, MemoryTaskSource, TaskSender};

use async_trait::async_trait;
use hermes_foundation::{Outbound, Result};

/// Task intake
#[async_trait]
pub trait TaskSource: Send {
    /// Next raw message; `Ok(None)` once the channel is closed for good
    async fn next(&mut self) -> Result<Option<String>>;
}

/// Status / response egress
#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn publish(&self, message: &Outbound) -> Result<()>;
}
