//! adpolicy service binary.
//!
//! - Loads `adpolicy.yaml` (or the path given as first argument)
//! - Restores the persisted deny cache, then refreshes it periodically
//! - Serves the ops endpoints

use std::net::SocketAddr;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use adpolicy_core::error::{AdPolicyError, Result};
use adpolicy_service::{app_state, config, router};

const THROTTLE_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "adpolicy-service exited with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "adpolicy.yaml".to_string());
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg.service.listen.parse().map_err(|e| {
        AdPolicyError::BadRequest(format!("service.listen must be a valid SocketAddr: {e}"))
    })?;
    let refresh = Duration::from_secs(cfg.service.refresh_interval_secs);

    let state = app_state::AppState::from_config(cfg)?;

    let resolver = state.resolver();
    let restored = resolver.restore_from_store().await;
    tracing::info!(status = %restored, "deny cache restore finished");
    let _refresh_task = resolver.spawn_refresh_task(refresh);
    let _prune_task = state.throttler().spawn_prune_task(THROTTLE_PRUNE_INTERVAL);

    let app = router::build_router(state);

    tracing::info!(%listen, config = %path, "adpolicy-service starting");
    let listener = tokio::net::TcpListener::bind(listen).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
