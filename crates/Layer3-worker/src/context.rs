//! Worker context - collaborators shared by every handler

use crate::lock::KeyedLocks;
use hermes_foundation::{RepositoryStore, RetryConfig, WorkerConfig};
use hermes_task::{Agent, RepositoryProvisioner, WorkspaceLayout};
use std::sync::Arc;

/// Everything a handler may touch
#[derive(Clone)]
pub struct WorkerContext {
    pub store: Arc<dyn RepositoryStore>,
    pub provisioner: Arc<dyn RepositoryProvisioner>,
    pub agent: Arc<dyn Agent>,
    pub layout: WorkspaceLayout,
    pub locks: KeyedLocks,
    pub settings: WorkerSettings,
}

/// Plain values copied out of [`WorkerConfig`]
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub agent_model: String,
    pub prime_output_limit: usize,
    pub max_concurrent_tasks: usize,
    pub response_retry: RetryConfig,
}

impl From<&WorkerConfig> for WorkerSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            agent_model: config.agent_model.clone(),
            prime_output_limit: config.prime_output_limit,
            max_concurrent_tasks: config.max_concurrent_tasks.max(1),
            response_retry: RetryConfig::with_max_retries(config.response_retries),
        }
    }
}

impl WorkerContext {
    pub fn new(
        config: &WorkerConfig,
        store: Arc<dyn RepositoryStore>,
        provisioner: Arc<dyn RepositoryProvisioner>,
        agent: Arc<dyn Agent>,
    ) -> Self {
        Self {
            store,
            provisioner,
            agent,
            layout: WorkspaceLayout::new(config.workspace_dir.clone()),
            locks: KeyedLocks::new(config.lock_timeout()),
            settings: WorkerSettings::from(config),
        }
    }
}
