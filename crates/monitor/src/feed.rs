//! Chain feed boundary: candidate transactions and settlement pulses are
//! pushed over channels so the detector never couples to the transport.
//!
//! The production implementation polls a node over JSON-RPC. Candidates are
//! announced at most once (a TTL cache remembers hashes already seen across
//! polls); a pulse is emitted once per new block, carrying the block
//! timestamp and the hashes it settled.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use moka::sync::Cache;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use mempool_sentry_domain::model::{AccountAddress, TxHash};

use crate::detector::{CandidateTx, SettlementPulse};
use crate::rpc::{parse_hex_quantity, RpcClient};
use crate::worker::MonitorError;

/// How long an announced hash is remembered. Longer than any realistic
/// txpool residency so a candidate is not re-announced while it waits.
const SEEN_HASH_TTL: Duration = Duration::from_secs(600);
const SEEN_HASH_CAPACITY: u64 = 100_000;

/// Buffered pulse capacity. Pulses are consumed sequentially; a small buffer
/// absorbs a slow consumer without unbounded growth.
const PULSE_BUFFER: usize = 32;

/// Receiver halves handed to the monitor loop.
pub struct FeedStreams {
    pub candidates: mpsc::UnboundedReceiver<CandidateTx>,
    pub pulses: mpsc::Receiver<SettlementPulse>,
}

/// Source of candidate transactions and settlement pulses. Pulses are
/// delivered in increasing-timestamp order, never concurrently; candidates
/// may arrive at any time relative to pulses.
#[async_trait]
pub trait ChainFeed: Send + Sync {
    async fn subscribe(&self) -> Result<FeedStreams, MonitorError>;
}

/// Polling feed over a node's JSON-RPC endpoint.
pub struct RpcChainFeed {
    client: Arc<RpcClient>,
    poll_interval: Duration,
    seen: Cache<String, ()>,
}

impl RpcChainFeed {
    pub fn new(client: RpcClient, poll_interval: Duration) -> Self {
        Self {
            client: Arc::new(client),
            poll_interval,
            seen: Cache::builder()
                .time_to_live(SEEN_HASH_TTL)
                .max_capacity(SEEN_HASH_CAPACITY)
                .build(),
        }
    }
}

#[async_trait]
impl ChainFeed for RpcChainFeed {
    async fn subscribe(&self) -> Result<FeedStreams, MonitorError> {
        let (candidate_tx, candidate_rx) = mpsc::unbounded_channel();
        let (pulse_tx, pulse_rx) = mpsc::channel(PULSE_BUFFER);

        let client = self.client.clone();
        let seen = self.seen.clone();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_block: Option<i64> = None;

            loop {
                ticker.tick().await;

                match client.txpool_content().await {
                    Ok(content) => {
                        counter!("mempool_monitor_rpc_calls_total", "result" => "ok")
                            .increment(1);
                        for entries in content.pending.values() {
                            for entry in entries.values() {
                                if !first_sighting(&seen, &entry.hash) {
                                    continue;
                                }
                                let candidate = CandidateTx {
                                    hash: TxHash::new(entry.hash.clone()),
                                    from: AccountAddress::new(entry.from.clone()),
                                };
                                if candidate_tx.send(candidate).is_err() {
                                    return;
                                }
                            }
                        }
                    }
                    Err(err) => {
                        counter!("mempool_monitor_rpc_calls_total", "result" => "error")
                            .increment(1);
                        warn!(?err, "txpool poll failed");
                    }
                }

                match client.latest_block().await {
                    Ok(block) => {
                        counter!("mempool_monitor_rpc_calls_total", "result" => "ok")
                            .increment(1);
                        let decoded = parse_hex_quantity(&block.number)
                            .zip(parse_hex_quantity(&block.timestamp));
                        let Some((number, timestamp)) = decoded else {
                            warn!(
                                number = %block.number,
                                timestamp = %block.timestamp,
                                "block carried malformed quantities"
                            );
                            continue;
                        };
                        if last_block == Some(number) {
                            continue;
                        }
                        last_block = Some(number);

                        let pulse = SettlementPulse {
                            timestamp,
                            settled: block.transactions.into_iter().map(TxHash::new).collect(),
                        };
                        if pulse_tx.send(pulse).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        counter!("mempool_monitor_rpc_calls_total", "result" => "error")
                            .increment(1);
                        warn!(?err, "latest block poll failed");
                    }
                }
            }
        });

        Ok(FeedStreams {
            candidates: candidate_rx,
            pulses: pulse_rx,
        })
    }
}

/// Returns `true` the first time a hash is observed and records it.
fn first_sighting(seen: &Cache<String, ()>, hash: &str) -> bool {
    if seen.contains_key(hash) {
        return false;
    }
    seen.insert(hash.to_string(), ());
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_announces_once() {
        let seen: Cache<String, ()> = Cache::builder()
            .time_to_live(Duration::from_secs(60))
            .max_capacity(16)
            .build();

        assert!(first_sighting(&seen, "0xaaa"));
        assert!(!first_sighting(&seen, "0xaaa"));
        assert!(first_sighting(&seen, "0xbbb"));
    }
}
