//! Storage module for Hermes
//!
//! - `json`: JSON - 범용 파일 저장/로드
//! - `repository`: 레포지토리 레코드 영속화 (find / upsert / delete)

mod json;
mod repository;

// JSON Storage (범용)
pub use json::JsonStore;

// Repository persistence collaborator
pub use repository::{JsonRepositoryStore, MemoryRepositoryStore, RepositoryStore};
