//! # hermes-worker
//!
//! Task dispatcher for Hermes.
//!
//! ## 구조
//!
//! ```text
//! TaskSource ──▶ Dispatcher ──▶ handlers (register / remove / sync / workflow)
//!                    │               │
//!                    │               ├── RepositoryProvisioner (hermes-task)
//!                    │               ├── Agent (hermes-task)
//!                    │               └── RepositoryStore (hermes-foundation)
//!                    ▼
//!              ResponseSink ◀── StatusReporter ◀── filter
//! ```
//!
//! Same-repository tasks are serialized through [`KeyedLocks`]; everything
//! else runs concurrently up to `max_concurrent_tasks`.

pub mod channel;
pub mod context;
pub mod dispatcher;
pub mod filter;
pub mod handlers;
pub mod lock;
pub mod prompts;
pub mod reporter;

pub use channel::{
    memory_channel, spawn_line_reader, JsonLinesSink, JsonLinesSource, MemorySink,
    MemoryTaskSource, ResponseSink, TaskSender, TaskSource,
};
pub use context::{WorkerContext, WorkerSettings};
pub use dispatcher::{DispatchStats, Dispatcher, MALFORMED_TASK_MESSAGE};
pub use filter::should_emit;
pub use handlers::Reply;
pub use lock::{KeyGuard, KeyedLocks};
pub use reporter::StatusReporter;
