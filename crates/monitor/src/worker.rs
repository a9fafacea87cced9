use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};

use mempool_sentry_domain::config::ConfigError;
use mempool_sentry_domain::services::telemetry::TelemetryError;

use crate::detector::{Detector, DetectorError, SettlementPulse};
use crate::feed::{ChainFeed, FeedStreams};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("settlement feed closed")]
    FeedClosed,
}

impl From<reqwest::Error> for MonitorError {
    fn from(value: reqwest::Error) -> Self {
        Self::Rpc(value.to_string())
    }
}

/// Runs the monitor until the feed closes: candidates are forwarded into the
/// detector from a separate task (they may arrive at any moment, including
/// mid-pulse), while settlement pulses are processed strictly one at a time.
pub async fn run_monitor<F>(detector: Arc<Detector>, feed: F) -> Result<(), MonitorError>
where
    F: ChainFeed,
{
    let FeedStreams {
        mut candidates,
        mut pulses,
    } = feed.subscribe().await?;

    let sink = detector.clone();
    tokio::spawn(async move {
        while let Some(candidate) = candidates.recv().await {
            sink.ingest(candidate);
        }
    });

    while let Some(pulse) = pulses.recv().await {
        handle_pulse(&detector, &pulse);
    }

    Err(MonitorError::FeedClosed)
}

fn handle_pulse(detector: &Detector, pulse: &SettlementPulse) {
    counter!("mempool_monitor_pulses_total").increment(1);
    let findings = detector.on_settlement(pulse);

    for finding in &findings {
        counter!("mempool_monitor_findings_total").increment(1);
        match serde_json::to_string(finding) {
            Ok(json) => info!(
                alert_id = %finding.alert_id,
                description = %finding.description,
                finding = %json,
                "finding emitted"
            ),
            Err(err) => warn!(?err, alert_id = %finding.alert_id, "failed to serialize finding"),
        }
    }
}
