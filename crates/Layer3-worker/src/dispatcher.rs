//! Task dispatcher
//!
//! Pulls raw messages from a [`TaskSource`], runs each task as its own tokio
//! task (bounded by `max_concurrent_tasks`), and publishes exactly one
//! terminal Response per decodable task, even if the handler panics.
//!
//! ```text
//! source.next() ──▶ Task::from_json ──▶ handlers::handle ──▶ sink.publish(Response)
//!                        │                      │ (catch_unwind)
//!                        ▼                      ▼
//!              "malformed" Response      failed Response
//! ```

use crate::channel::{ResponseSink, TaskSource};
use crate::context::WorkerContext;
use crate::handlers::{self, Reply};
use crate::reporter::StatusReporter;
use futures::FutureExt;
use hermes_foundation::{
    with_retry, Error, Outbound, RequesterId, ResponseStatus, Result, RetryConfig, Task, TaskId,
    TaskResponse,
};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Reply text for messages that are not a valid task
pub const MALFORMED_TASK_MESSAGE: &str = "Unsupported or malformed task";

/// Counters for one [`Dispatcher::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub received: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub malformed: u64,
    pub panicked: u64,
    /// Terminal responses that could not be published even after retrying
    pub undelivered: u64,
}

impl DispatchStats {
    fn record(&mut self, joined: std::result::Result<TaskOutcome, JoinError>) {
        match joined {
            Ok(outcome) => {
                match outcome.kind {
                    OutcomeKind::Succeeded => self.succeeded += 1,
                    OutcomeKind::Failed => self.failed += 1,
                    OutcomeKind::Malformed => self.malformed += 1,
                    OutcomeKind::Panicked => self.panicked += 1,
                }
                if !outcome.delivered {
                    self.undelivered += 1;
                }
            }
            Err(e) => {
                error!("Task join failed: {}", e);
                self.panicked += 1;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutcomeKind {
    Succeeded,
    Failed,
    Malformed,
    Panicked,
}

#[derive(Debug, Clone, Copy)]
struct TaskOutcome {
    kind: OutcomeKind,
    delivered: bool,
}

/// Entry point of the worker
pub struct Dispatcher {
    ctx: Arc<WorkerContext>,
    sink: Arc<dyn ResponseSink>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(ctx: WorkerContext, sink: Arc<dyn ResponseSink>) -> Self {
        Self {
            ctx: Arc::new(ctx),
            sink,
            shutdown: CancellationToken::new(),
        }
    }

    /// Use an externally owned shutdown token
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Cancelling this token stops intake; in-flight tasks still finish
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn context(&self) -> &WorkerContext {
        &self.ctx
    }

    /// Run until the source is exhausted or shutdown is requested, then wait
    /// for every in-flight task.
    pub async fn run<S: TaskSource>(&self, mut source: S) -> Result<DispatchStats> {
        let max_concurrent = self.ctx.settings.max_concurrent_tasks.max(1);
        let slots = Arc::new(Semaphore::new(max_concurrent));
        let mut in_flight: JoinSet<TaskOutcome> = JoinSet::new();
        let mut stats = DispatchStats::default();
        let mut source_error = None;

        info!(max_concurrent, "Dispatcher started");

        loop {
            while let Some(joined) = in_flight.try_join_next() {
                stats.record(joined);
            }

            // A slot is claimed before receiving so a full worker leaves
            // messages in the channel.
            let permit = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                permit = Arc::clone(&slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let raw = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                next = source.next() => match next {
                    Ok(Some(raw)) => raw,
                    Ok(None) => {
                        info!("Task source closed");
                        break;
                    }
                    Err(e) => {
                        error!("Task source failed: {}", e);
                        source_error = Some(e);
                        break;
                    }
                },
            };

            stats.received += 1;
            let ctx = Arc::clone(&self.ctx);
            let sink = Arc::clone(&self.sink);
            in_flight.spawn(async move {
                let _permit = permit;
                process(ctx, sink, raw).await
            });
        }

        if !in_flight.is_empty() {
            info!(in_flight = in_flight.len(), "Waiting for in-flight tasks");
        }
        while let Some(joined) = in_flight.join_next().await {
            stats.record(joined);
        }

        info!(
            received = stats.received,
            succeeded = stats.succeeded,
            failed = stats.failed,
            malformed = stats.malformed,
            panicked = stats.panicked,
            undelivered = stats.undelivered,
            "Dispatcher stopped"
        );

        match source_error {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }
}

/// Decode, handle and answer one raw message
async fn process(ctx: Arc<WorkerContext>, sink: Arc<dyn ResponseSink>, raw: String) -> TaskOutcome {
    let retry = ctx.settings.response_retry.clone();

    let task = match Task::from_json(&raw) {
        Ok(task) => Arc::new(task),
        Err(e) => return reject_malformed(sink.as_ref(), &retry, &raw, &e).await,
    };

    let span = info_span!(
        "task",
        task_id = %task.task_id,
        requester_id = %task.requester_id,
        operation = %task.operation,
    );

    async move {
        info!(level = %task.reporting_level, "Task started");
        let started = Instant::now();
        let reporter = StatusReporter::new(Arc::clone(&task), Arc::clone(&sink));

        let handled = AssertUnwindSafe(handlers::handle(&ctx, &task, &reporter))
            .catch_unwind()
            .await;

        let (reply, kind) = match handled {
            Ok(Ok(reply)) => {
                let kind = match reply.status {
                    ResponseStatus::Success => OutcomeKind::Succeeded,
                    ResponseStatus::Failed => OutcomeKind::Failed,
                };
                (reply, kind)
            }
            Ok(Err(e)) => {
                if e.is_user_facing() {
                    warn!("Task rejected: {}", e);
                } else {
                    error!("Task failed: {}", e);
                }
                (Reply::failed(e.user_message()), OutcomeKind::Failed)
            }
            Err(panic) => {
                error!(panic = %panic_message(panic.as_ref()), "Handler panicked");
                let e = Error::Internal("handler panicked".into());
                (Reply::failed(e.user_message()), OutcomeKind::Panicked)
            }
        };

        info!(
            status = ?reply.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Task finished"
        );

        let delivered = publish_response(sink.as_ref(), &retry, reply.into_response(&task)).await;
        TaskOutcome { kind, delivered }
    }
    .instrument(span)
    .await
}

/// Answer a message that is not a valid task, if it can be correlated at all
async fn reject_malformed(
    sink: &dyn ResponseSink,
    retry: &RetryConfig,
    raw: &str,
    cause: &Error,
) -> TaskOutcome {
    let ids = serde_json::from_str::<Value>(raw).ok().and_then(|value| {
        let task_id = id_field(&value, &["task_id"])?;
        let requester_id = id_field(&value, &["requester_id", "telegram_id"])?;
        Some((task_id, requester_id))
    });

    let Some((task_id, requester_id)) = ids else {
        warn!(len = raw.len(), "Dropping uncorrelatable message: {}", cause);
        return TaskOutcome {
            kind: OutcomeKind::Malformed,
            delivered: true,
        };
    };

    warn!(task_id = %task_id, "Rejecting malformed task: {}", cause);
    let response = TaskResponse {
        task_id: TaskId::new(task_id),
        requester_id: RequesterId::new(requester_id),
        status: ResponseStatus::Failed,
        message: MALFORMED_TASK_MESSAGE.to_string(),
        operation: None,
        extra: None,
    };
    let delivered = publish_response(sink, retry, response).await;
    TaskOutcome {
        kind: OutcomeKind::Malformed,
        delivered,
    }
}

/// Publish a terminal Response with bounded retries
async fn publish_response(sink: &dyn ResponseSink, retry: &RetryConfig, response: TaskResponse) -> bool {
    let task_id = response.task_id.clone();
    let message = Outbound::Response(response);

    match with_retry(retry, "publish response", || sink.publish(&message)).await {
        Ok(()) => {
            debug!(task_id = %task_id, "Response published");
            true
        }
        Err(e) => {
            error!(
                task_id = %task_id,
                "Terminal response LOST, requester will see no reply: {}", e
            );
            false
        }
    }
}

fn id_field(value: &Value, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match value.get(*name)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_field_accepts_numbers_and_aliases() {
        let value = json!({"task_id": "t-9", "telegram_id": 4242});
        assert_eq!(id_field(&value, &["task_id"]).as_deref(), Some("t-9"));
        assert_eq!(
            id_field(&value, &["requester_id", "telegram_id"]).as_deref(),
            Some("4242")
        );
        assert_eq!(id_field(&json!({"task_id": ""}), &["task_id"]), None);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
