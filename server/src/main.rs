//! songloom HTTP server.

mod auth;
mod routes;
mod state;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use songloom::config::{default_config_path, load_config, CONFIG_ENV_VAR};
use state::AppState;

/// songloom - music generation job server
#[derive(Parser, Debug)]
#[command(name = "songloom-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (default: ~/.songloom/songloom.json)
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,
}

impl Args {
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => default_config_path().context("could not determine the home directory"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = Args::parse().config_path()?;
    let config = load_config(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;

    songloom::logging::init(config.logging.format)?;
    info!(config = %path.display(), "Starting songloom server");

    let bind = config.server.bind.clone();
    let state = AppState::from_config(config)?;
    let app = routes::router(state);

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    info!("Listening on http://{}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
