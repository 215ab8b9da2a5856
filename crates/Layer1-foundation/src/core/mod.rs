//! Core Module - 핵심 도메인 타입
//!
//! Worker 전체가 공유하는 데이터 타입을 정의합니다.
//!
//! ## 타입 계층
//!
//! - `types.rs`: 작업 단위 (Task, OperationKind, payloads, ReportingLevel)
//! - `message.rs`: 송신 메시지 (Status, Response, Outbound)
//! - `repository.rs`: 영속 레코드 (RepositoryRecord, RepoKey)
//!
//! ```text
//!  channel ──► Task ──► handler ──► Status* ──► Response (exactly one)
//!                          │
//!                          └──► RepositoryRecord (find / upsert / delete)
//! ```

pub mod message;
pub mod repository;
pub mod types;

pub use message::{MessageCategory, Outbound, ResponseStatus, StatusMessage, TaskResponse};
pub use repository::{RepoKey, RepositoryRecord};
pub use types::{
    OperationKind, RegisterRepo, RemoveRepo, ReportingLevel, RequesterId, RunWorkflow, SyncRepo,
    Task, TaskId, WorkflowKind,
};
