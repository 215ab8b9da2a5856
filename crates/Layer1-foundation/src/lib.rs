//! # hermes-foundation
//!
//! Foundation layer for Hermes:
//! - Core: 도메인 타입 (Task, Status/Response, RepositoryRecord)
//! - Config: 통합 설정 (WorkerConfig)
//! - Storage: JsonStore (범용), RepositoryStore (영속화 협력자)
//! - Retry: 지수 백오프 재시도
//!
//! ## 아키텍처
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  Layer4  cli      (entry point, logging)     │
//! │  Layer3  worker   (dispatcher, filter, IO)   │
//! │  Layer2  task     (git, agent, processes)    │
//! │  Layer1  foundation (types, config, errors)  │
//! └──────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod retry;
pub mod storage;
pub mod strings;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result, CONFLICTING_OPERATION_MESSAGE};

// ============================================================================
// Core (도메인 타입)
// ============================================================================
pub use core::{
    // Task (types.rs)
    OperationKind,
    RegisterRepo,
    RemoveRepo,
    ReportingLevel,
    RequesterId,
    RunWorkflow,
    SyncRepo,
    Task,
    TaskId,
    WorkflowKind,
    // Messages (message.rs)
    MessageCategory,
    Outbound,
    ResponseStatus,
    StatusMessage,
    TaskResponse,
    // Repository (repository.rs)
    RepoKey,
    RepositoryRecord,
};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{Secret, WorkerConfig, WORKER_CONFIG_FILE};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::{JsonRepositoryStore, JsonStore, MemoryRepositoryStore, RepositoryStore};

// ============================================================================
// Retry
// ============================================================================
pub use retry::{with_retry, RetryConfig};
