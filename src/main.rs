use std::net::SocketAddr;

use tracing::info;
use tracing_subscriber::EnvFilter;

use hivemind::{api, AppState, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("═══════════════════════════════════════════════════");
    info!("  HiveMind — Collective Trading Intelligence");
    info!("═══════════════════════════════════════════════════");

    let settings = Settings::from_env();
    info!(
        "📊 Config: bind={} lock_timeout={}ms",
        settings.bind_addr, settings.lock_timeout_ms,
    );

    let addr: SocketAddr = settings.bind_addr.parse()?;
    let state = AppState::new(&settings);

    api::serve(state, addr).await
}
