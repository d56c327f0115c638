//! Drowsiness Detection Client - Main Entry Point

use app::{init_logging, run, AppConfig};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1);
    let config = AppConfig::load(config_path.as_deref())?;

    init_logging(&config.logging)?;

    info!("=== Drowsiness Client v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Detection server: {}", config.server.base_url);

    run(config).await
}
