pub mod config;
pub mod downloader;
pub mod server;

use std::sync::Arc;
use tracing::info;

use config::ServerConfig;
use downloader::YtDlpTool;
use server::{AppState, ServerError};

/// Bind the configured address and serve until Ctrl-C.
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let tool = Arc::new(YtDlpTool::new(config.tool.clone()));
    let state = AppState::new(tool, config.manifest_timeout, config.chunk_size);
    let app = server::router(state, &config.allowed_origins);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.bind_addr.clone(),
            source,
        })?;

    info!(
        "[Server] Listening on {} (yt-dlp: {}, formats timeout: {}s)",
        config.bind_addr,
        config.tool.path,
        config.manifest_timeout.as_secs()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    info!("[Server] Stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("[Server] Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
