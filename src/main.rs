use tracing::error;
use tracing_subscriber::EnvFilter;

use youtube_downloader_api::config::ServerConfig;

const DEFAULT_LOG_FILTER: &str = "youtube_downloader_api=info,tower_http=info";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let result = match ServerConfig::from_env() {
        Ok(config) => youtube_downloader_api::run(config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}
