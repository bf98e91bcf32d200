mod api;
mod error;
mod models;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use vmm_core::callback::{HttpCallback, LoggingCallback, NodeManagerCallback};
use vmm_core::child_table::ChildTable;
use vmm_core::dfs::LocalDfs;
use vmm_core::info_store::InfoStore;
use vmm_core::{Engine, QemuConfig, Reaper};

use state::AppState;

#[derive(Parser)]
#[command(name = "vmm-daemon")]
#[command(about = "Per-host supervisor hosting the Node-Manager VM Control Core", long_about = None)]
struct Cli {
    /// Config file path; created with defaults on first run.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root directory standing in for the cluster's DFS.
    #[arg(long, default_value = "/var/lib/vmm/dfs")]
    dfs_root: PathBuf,

    /// Base URL of the cluster manager to POST state-change notifications
    /// to; logs only if unset.
    #[arg(long, env = "VMM_NODE_MANAGER_URL")]
    node_manager_url: Option<String>,

    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:7620")]
    listen: String,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config_path = cli.config.unwrap_or_else(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vmm")
            .join("config.toml")
    });
    let config = QemuConfig::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    tracing::info!(path = %config_path.display(), "loaded configuration");

    let children = Arc::new(ChildTable::new());
    let info_store = Arc::new(InfoStore::new(config.info_dir.clone())?);
    let dfs = Arc::new(LocalDfs::new(cli.dfs_root.clone()));
    let callback: Arc<dyn NodeManagerCallback> = match cli.node_manager_url {
        Some(url) => Arc::new(HttpCallback::new(url)),
        None => Arc::new(LoggingCallback),
    };

    let engine = Arc::new(Engine::new(config, children, info_store, dfs, callback));
    engine
        .recover()
        .context("recovering persisted VM records at startup")?;

    let reaper = Reaper::new(engine.clone());
    let _reaper_handle = reaper.spawn();

    let state = AppState { backend: engine };
    let app = api::router(state).layer(tower_http::trace::TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&cli.listen)
        .await
        .with_context(|| format!("binding {}", cli.listen))?;
    tracing::info!(addr = %cli.listen, "vmm-daemon listening");
    axum::serve(listener, app).await?;

    reaper.stop();
    Ok(())
}
