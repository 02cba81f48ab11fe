//! Mockwork server CLI.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use mockwork_server::config::Config;
use mockwork_server::store::{DefinitionStore, InMemoryDefinitionStore, JsonFileDefinitionStore};
use mockwork_server::Workspace;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "mockwork",
    about = "Workspace-scoped HTTP mock server with live-editable routes",
    version
)]
struct Args {
    /// Workspace file (YAML or JSON); one default workspace when omitted
    #[arg(short, long, env = "MOCKWORK_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Directory holding `<workspace-id>.definitions.json`; in-memory when empty
    #[arg(short, long, env = "MOCKWORK_DATASET")]
    dataset: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

fn open_store(
    dataset: Option<&PathBuf>,
    workspace: &mockwork_server::WorkspaceConfig,
) -> Result<Arc<dyn DefinitionStore>> {
    match dataset {
        Some(dir) => {
            let path = workspace.dataset_file(dir);
            let store = JsonFileDefinitionStore::open(&path)
                .with_context(|| format!("failed to open dataset for workspace '{}'", workspace.id))?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryDefinitionStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_format);

    let config = match &args.workspace {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load workspace file {}", path.display()))?,
        None => Config::default(),
    };
    if args.validate {
        info!("Configuration is valid ({} workspaces)", config.workspaces.len());
        return Ok(());
    }

    let dataset = args.dataset.filter(|p| !p.as_os_str().is_empty());
    let (shutdown_tx, _) = broadcast::channel(1);
    let mut tasks = Vec::new();

    for ws_config in config.workspaces {
        let store = open_store(dataset.as_ref(), &ws_config)?;
        let workspace = Arc::new(Workspace::new(ws_config, store));
        workspace.load()?;
        let (listener, addr) = workspace.bind().await?;
        info!(workspace = %workspace.id(), "Bound {}", addr);

        let shutdown_rx = shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            workspace.serve(listener, shutdown_rx).await;
        }));
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("Shutting down");
    let _ = shutdown_tx.send(());

    for task in tasks {
        if let Err(e) = task.await {
            error!("Workspace task failed: {}", e);
        }
    }
    Ok(())
}
