//! Hermes worker - Main entry point

mod worker;

use clap::Parser;
use hermes_foundation::WorkerConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Hermes - repository and agent task worker
///
/// Reads one JSON task per line from stdin and writes status/response
/// messages as JSON lines to stdout. Logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "hermes-worker")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to ~/.hermes/worker.json when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base workspace directory for working copies and transcripts
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Maximum number of tasks in flight
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    /// Command-line flags win over file and environment
    fn apply(&self, mut config: WorkerConfig) -> WorkerConfig {
        if let Some(workspace) = &self.workspace {
            config = config.workspace_dir(workspace.clone());
        }
        if let Some(n) = self.max_concurrent {
            config = config.max_concurrent_tasks(n);
        }
        if self.debug {
            config.log_level = "debug".to_string();
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = args.apply(WorkerConfig::load(args.config.as_deref())?);

    let filter = if args.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level))
    };

    // stdout carries the outbound channel
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    config.validate()?;
    worker::serve(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::try_parse_from([
            "hermes-worker",
            "--workspace",
            "/srv/hermes",
            "--max-concurrent",
            "8",
            "--debug",
        ])
        .unwrap();

        let config = args.apply(WorkerConfig::default());
        assert_eq!(config.workspace_dir, PathBuf::from("/srv/hermes"));
        assert_eq!(config.max_concurrent_tasks, 8);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = Args::try_parse_from(["hermes-worker"]).unwrap();
        let config = args.apply(WorkerConfig::default());
        assert_eq!(config.max_concurrent_tasks, WorkerConfig::default().max_concurrent_tasks);
        assert_eq!(config.log_level, "info");
    }
}
