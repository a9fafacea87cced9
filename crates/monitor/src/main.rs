//! Monitor binary that watches the transaction pool for tracked accounts
//! accumulating too many pending transactions inside the sliding window.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use mempool_sentry_domain::config::{MonitorConfig, Watchlist};
use mempool_sentry_domain::services::alerts::PendingTxAlerts;
use mempool_sentry_domain::services::telemetry::{init_telemetry, TelemetryConfig};
use mempool_sentry_monitor::{
    run_monitor, Detector, MonitorError, RpcChainFeed, RpcClient, SystemClock, WindowConfig,
};

#[tokio::main]
async fn main() -> io::Result<()> {
    if let Err(err) = bootstrap().await {
        eprintln!("[monitor] bootstrap failed: {err}");
        return Err(io::Error::other(err.to_string()));
    }

    Ok(())
}

async fn bootstrap() -> Result<(), MonitorError> {
    let config = MonitorConfig::load_from_env()?;
    let telemetry_config = TelemetryConfig::from_env("MONITOR");
    init_telemetry(&telemetry_config)?;

    let watchlist = Watchlist::from_path(config.watchlist_path())?;
    let detector = Arc::new(Detector::new(
        WindowConfig {
            window_seconds: config.window_seconds(),
            count_threshold: config.tx_threshold(),
        },
        &watchlist,
        Arc::new(SystemClock::new()),
        Arc::new(PendingTxAlerts::new(config.window_seconds())),
    )?);

    let client = RpcClient::new(config.rpc_url());
    let feed = RpcChainFeed::new(client, Duration::from_millis(config.poll_interval_ms()));

    info!(
        accounts = watchlist.len(),
        window_seconds = config.window_seconds(),
        threshold = config.tx_threshold(),
        "starting pending transaction monitor"
    );

    run_monitor(detector, feed).await
}
