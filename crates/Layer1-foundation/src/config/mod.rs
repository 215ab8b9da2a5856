//! Config - 설정 관리
//!
//! - `worker.rs` - WorkerConfig 통합 설정

mod worker;

pub use worker::{Secret, WorkerConfig, WORKER_CONFIG_FILE};
