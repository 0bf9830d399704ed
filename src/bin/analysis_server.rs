//! Analysis server: hosts one analysis job per TCP connection.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use trasa_analyzer::config::Config;
use trasa_analyzer::server::handle_connection;

const CONFIG_PATH: &str = "trasa.toml";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("analysis_server=info,trasa_analyzer=info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path)?,
        None => Config::load_or_default(CONFIG_PATH),
    };
    let config = Arc::new(config);

    info!("Analysis Server ({})", env!("GIT_VERSION"));
    info!(
        "[config] channel_capacity={}, publish_interval={}, frame_stride={}",
        config.job.channel_capacity, config.job.publish_interval, config.job.frame_stride
    );

    let listener = TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen_addr))?;
    info!("Listening on {}", config.server.listen_addr);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            signal.cancel();
        }
    });

    loop {
        let (tcp_stream, addr) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted?,
        };
        tcp_stream.set_nodelay(true)?;
        info!("Client connected: {}", addr);

        let config = Arc::clone(&config);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(tcp_stream, &config, shutdown).await {
                warn!("Connection {} error: {:#}", addr, e);
            }
            info!("Client disconnected: {}", addr);
        });
    }
    Ok(())
}
