//! In-process channel, used by tests and embedders

use super::{ResponseSink, TaskSource};
use async_trait::async_trait;
use hermes_foundation::{Error, Outbound, Result, Task, TaskId, TaskResponse};
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

/// Create a connected sender / source pair
pub fn memory_channel() -> (TaskSender, MemoryTaskSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TaskSender { tx }, MemoryTaskSource { rx })
}

/// Producer half; dropping every clone closes the channel
#[derive(Debug, Clone)]
pub struct TaskSender {
    tx: mpsc::UnboundedSender<String>,
}

impl TaskSender {
    pub fn send(&self, task: &Task) -> Result<()> {
        self.send_raw(serde_json::to_string(task)?)
    }

    pub fn send_raw(&self, raw: impl Into<String>) -> Result<()> {
        self.tx
            .send(raw.into())
            .map_err(|_| Error::Channel("task channel closed".to_string()))
    }
}

#[derive(Debug)]
pub struct MemoryTaskSource {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl TaskSource for MemoryTaskSource {
    async fn next(&mut self) -> Result<Option<String>> {
        Ok(self.rx.recv().await)
    }
}

/// Records everything published
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<Outbound>>,
    notify: Notify,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Outbound> {
        self.messages.lock().clone()
    }

    /// Messages for one task, in publish order
    pub fn for_task(&self, task_id: &TaskId) -> Vec<Outbound> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.task_id() == task_id)
            .cloned()
            .collect()
    }

    pub fn responses(&self) -> Vec<TaskResponse> {
        self.messages
            .lock()
            .iter()
            .filter_map(|m| m.as_response().cloned())
            .collect()
    }

    pub fn response_for(&self, task_id: &TaskId) -> Option<TaskResponse> {
        self.responses().into_iter().find(|r| &r.task_id == task_id)
    }

    /// Wait until at least `count` responses were published
    pub async fn wait_for_responses(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.responses().len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl ResponseSink for MemorySink {
    async fn publish(&self, message: &Outbound) -> Result<()> {
        self.messages.lock().push(message.clone());
        self.notify.notify_waiters();
        Ok(())
    }
}
