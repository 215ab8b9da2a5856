//! Worker wiring - stdin/stdout channel, JSON store, git, agent CLI

use hermes_foundation::{JsonRepositoryStore, WorkerConfig};
use hermes_task::{ClaudeInvoker, RepositoryManager};
use hermes_worker::{spawn_line_reader, Dispatcher, JsonLinesSink, WorkerContext};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run until stdin closes, SIGINT or SIGTERM, then wait for in-flight tasks
pub async fn serve(config: WorkerConfig) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.workspace_dir).await?;

    let agent = ClaudeInvoker::from_config(&config);
    if !agent.binary_available() {
        warn!(
            binary = %agent.binary(),
            "Agent binary not found on PATH; agent steps will fail"
        );
    }

    let store = Arc::new(JsonRepositoryStore::in_workspace(&config.workspace_dir));
    let provisioner = Arc::new(RepositoryManager::from_config(&config));
    let ctx = WorkerContext::new(&config, store, provisioner, Arc::new(agent));

    let sink = Arc::new(JsonLinesSink::new(tokio::io::stdout()));
    let source = spawn_line_reader(std::io::BufReader::new(std::io::stdin()))?;
    let dispatcher = Dispatcher::new(ctx, sink);

    tokio::spawn(cancel_on_signal(dispatcher.shutdown_token()));

    info!(
        workspace = %config.workspace_dir.display(),
        max_concurrent = config.max_concurrent_tasks,
        model = %config.agent_model,
        "Hermes worker ready"
    );

    let stats = dispatcher.run(source).await?;
    info!(
        received = stats.received,
        succeeded = stats.succeeded,
        failed = stats.failed,
        "Hermes worker stopped"
    );
    Ok(())
}

async fn cancel_on_signal(shutdown: CancellationToken) {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("Interrupted; finishing in-flight tasks"),
        _ = terminate => info!("Terminated; finishing in-flight tasks"),
    }
    shutdown.cancel();
}
