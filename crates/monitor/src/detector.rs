//! Sliding-window pending-transaction detector.
//!
//! Candidate transactions stream in asynchronously and are staged with an
//! interpolated timestamp. Each settlement pulse (a new block) re-anchors the
//! clock, drains the staging buffer into per-account queues, removes records
//! whose hash settled, ages out records that fell outside the window, and
//! emits a finding for every account whose pending count strictly exceeds the
//! configured threshold.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use metrics::{counter, gauge, histogram};
use thiserror::Error;
use tracing::debug;

use mempool_sentry_domain::config::Watchlist;
use mempool_sentry_domain::model::{AccountAddress, Finding, TxHash};
use mempool_sentry_domain::services::alerts::AlertEmitter;

use crate::anchor::{Clock, TimeAnchor};

/// Immutable window parameters, validated at detector construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    /// Trailing span (seconds) over which pending counts are evaluated.
    pub window_seconds: u64,
    /// An account alerts when its pending count strictly exceeds this.
    pub count_threshold: usize,
}

/// A not-yet-settled transaction announced by the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTx {
    pub hash: TxHash,
    pub from: AccountAddress,
}

/// A settlement notification: the block timestamp plus the hashes it
/// confirmed. Delivered in increasing-timestamp order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPulse {
    pub timestamp: i64,
    pub settled: Vec<TxHash>,
}

/// A candidate waiting for the next pulse to be attributed.
#[derive(Debug, Clone)]
struct StagedCandidate {
    hash: TxHash,
    from: AccountAddress,
    timestamp: i64,
}

/// A candidate attributed to a tracked account, pending until it settles or
/// ages out of the window.
#[derive(Debug, Clone)]
struct PendingRecord {
    hash: TxHash,
    timestamp: i64,
}

struct TrackedAccount {
    name: String,
    address: AccountAddress,
    pending: VecDeque<PendingRecord>,
}

/// Errors surfaced when the detector is constructed with unusable parameters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetectorError {
    #[error("window must be at least one second")]
    ZeroWindow,
    #[error("watchlist must contain at least one account")]
    EmptyWatchlist,
}

/// Owns all detection state. Shared via `Arc`: `ingest` may be called from
/// any task at any time, while settlement pulses are processed by a single
/// sequential consumer.
pub struct Detector {
    window: WindowConfig,
    accounts: Mutex<Vec<TrackedAccount>>,
    staging: Mutex<Vec<StagedCandidate>>,
    anchor: RwLock<Option<TimeAnchor>>,
    clock: Arc<dyn Clock>,
    alerts: Arc<dyn AlertEmitter>,
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector").finish_non_exhaustive()
    }
}

impl Detector {
    pub fn new(
        window: WindowConfig,
        watchlist: &Watchlist,
        clock: Arc<dyn Clock>,
        alerts: Arc<dyn AlertEmitter>,
    ) -> Result<Self, DetectorError> {
        if window.window_seconds == 0 {
            return Err(DetectorError::ZeroWindow);
        }
        if watchlist.is_empty() {
            return Err(DetectorError::EmptyWatchlist);
        }

        let accounts = watchlist
            .entries()
            .iter()
            .map(|entry| TrackedAccount {
                name: entry.name.clone(),
                address: entry.address.clone(),
                pending: VecDeque::new(),
            })
            .collect();

        Ok(Self {
            window,
            accounts: Mutex::new(accounts),
            staging: Mutex::new(Vec::new()),
            anchor: RwLock::new(None),
            clock,
            alerts,
        })
    }

    /// Whether the first settlement pulse has arrived.
    pub fn is_anchored(&self) -> bool {
        self.anchor.read().expect("anchor lock poisoned").is_some()
    }

    /// Current queue depth for an account, if it is on the watchlist.
    pub fn pending_depth(&self, address: &AccountAddress) -> Option<usize> {
        let accounts = self.accounts.lock().expect("accounts lock poisoned");
        accounts
            .iter()
            .find(|account| &account.address == address)
            .map(|account| account.pending.len())
    }

    /// Stages a candidate transaction. Never blocks beyond a brief lock.
    ///
    /// Candidates arriving before the first settlement pulse cannot be
    /// timestamped meaningfully and are dropped.
    pub fn ingest(&self, candidate: CandidateTx) {
        let anchor = *self.anchor.read().expect("anchor lock poisoned");
        let Some(anchor) = anchor else {
            counter!(
                "mempool_monitor_candidates_total",
                "result" => "dropped_unanchored"
            )
            .increment(1);
            return;
        };

        let timestamp = anchor.estimate(self.clock.monotonic());
        let mut staging = self.staging.lock().expect("staging lock poisoned");
        staging.push(StagedCandidate {
            hash: candidate.hash,
            from: candidate.from,
            timestamp,
        });
        counter!("mempool_monitor_candidates_total", "result" => "staged").increment(1);
    }

    /// Processes one settlement pulse to completion: re-anchor, drain,
    /// confirm, evict, evaluate. Must not run concurrently with itself;
    /// `ingest` may run concurrently throughout.
    pub fn on_settlement(&self, pulse: &SettlementPulse) -> Vec<Finding> {
        // Re-anchor first so candidates arriving while this pulse is being
        // processed interpolate off the fresh timestamp.
        {
            let mut anchor = self.anchor.write().expect("anchor lock poisoned");
            *anchor = Some(TimeAnchor::new(pulse.timestamp, self.clock.monotonic()));
        }

        // Atomically take exactly the candidates staged at this instant.
        // Later arrivals land in the fresh buffer and wait for the next
        // pulse, so nothing is processed twice.
        let drained = {
            let mut staging = self.staging.lock().expect("staging lock poisoned");
            std::mem::take(&mut *staging)
        };
        histogram!("mempool_monitor_batch_entries").record(drained.len() as f64);

        let settled: HashSet<&TxHash> = pulse.settled.iter().collect();
        let horizon = pulse.timestamp - self.window.window_seconds as i64;

        let mut accounts = self.accounts.lock().expect("accounts lock poisoned");

        let mut attributed = 0u64;
        let mut unattributed = 0u64;
        for candidate in drained {
            // Watchlist addresses are unique, so the first match is the only
            // match and a hash can never land in two queues.
            match accounts
                .iter_mut()
                .find(|account| account.address == candidate.from)
            {
                Some(account) => {
                    account.pending.push_back(PendingRecord {
                        hash: candidate.hash,
                        timestamp: candidate.timestamp,
                    });
                    attributed += 1;
                }
                None => unattributed += 1,
            }
        }
        counter!("mempool_monitor_drained_total", "result" => "attributed")
            .increment(attributed);
        counter!("mempool_monitor_drained_total", "result" => "unattributed")
            .increment(unattributed);

        let mut findings = Vec::new();
        for account in accounts.iter_mut() {
            // Settled hashes are no longer pending, even if still in-window.
            account
                .pending
                .retain(|record| !settled.contains(&record.hash));

            // Age out stale records oldest-first; the queue is in arrival
            // order, so the first in-window record ends the scan.
            while let Some(front) = account.pending.front() {
                if front.timestamp < horizon {
                    account.pending.pop_front();
                } else {
                    break;
                }
            }

            let num_pending = account.pending.len();
            gauge!(
                "mempool_monitor_pending_depth",
                "account" => account.name.clone()
            )
            .set(num_pending as f64);

            if num_pending > self.window.count_threshold {
                debug!(
                    account = %account.name,
                    num_pending,
                    threshold = self.window.count_threshold,
                    "pending count over threshold"
                );
                findings.push(
                    self.alerts
                        .emit(&account.name, &account.address, num_pending),
                );
            }
        }
        gauge!("mempool_monitor_last_settlement_timestamp").set(pulse.timestamp as f64);

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    use mempool_sentry_domain::config::{Watchlist, WatchlistEntry};
    use mempool_sentry_domain::services::alerts::PendingTxAlerts;

    const MAKER: &str = "0x29ecd1b7c26fa200c444da0d5a278ed5c8083c10";
    const ARBITRAGEUR: &str = "0x1b8c6b1b2c8173e20d1eb952d8bc9bd62ad26f10";
    const STRANGER: &str = "0xffffffffffffffffffffffffffffffffffffffff";

    /// Deterministic monotonic clock driven by the test.
    #[derive(Default)]
    struct ManualClock {
        nanos: AtomicU64,
    }

    impl ManualClock {
        fn advance_secs(&self, secs: u64) {
            self.nanos
                .fetch_add(secs * 1_000_000_000, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn monotonic(&self) -> Duration {
            Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
        }
    }

    fn watchlist() -> Watchlist {
        Watchlist::from_entries(vec![
            WatchlistEntry {
                name: "maker".to_string(),
                address: AccountAddress::new(MAKER),
            },
            WatchlistEntry {
                name: "arbitrageur".to_string(),
                address: AccountAddress::new(ARBITRAGEUR),
            },
        ])
        .expect("watchlist builds")
    }

    fn detector(window_seconds: u64, count_threshold: usize) -> (Arc<ManualClock>, Detector) {
        let clock = Arc::new(ManualClock::default());
        let detector = Detector::new(
            WindowConfig {
                window_seconds,
                count_threshold,
            },
            &watchlist(),
            clock.clone(),
            Arc::new(PendingTxAlerts::new(window_seconds)),
        )
        .expect("detector builds");
        (clock, detector)
    }

    fn candidate(hash: &str, from: &str) -> CandidateTx {
        CandidateTx {
            hash: TxHash::new(hash),
            from: AccountAddress::new(from),
        }
    }

    fn pulse(timestamp: i64, settled: &[&str]) -> SettlementPulse {
        SettlementPulse {
            timestamp,
            settled: settled.iter().map(|hash| TxHash::new(*hash)).collect(),
        }
    }

    fn ingest_batch(detector: &Detector, from: &str, count: usize) {
        for i in 0..count {
            detector.ingest(candidate(&format!("0x{i:x}"), from));
        }
    }

    #[test]
    fn rejects_zero_window() {
        let err = Detector::new(
            WindowConfig {
                window_seconds: 0,
                count_threshold: 5,
            },
            &watchlist(),
            Arc::new(ManualClock::default()),
            Arc::new(PendingTxAlerts::new(0)),
        )
        .unwrap_err();
        assert_eq!(err, DetectorError::ZeroWindow);
    }

    #[test]
    fn rejects_empty_watchlist() {
        let empty = Watchlist::from_entries(Vec::new()).expect("empty watchlist builds");
        let err = Detector::new(
            WindowConfig {
                window_seconds: 60,
                count_threshold: 5,
            },
            &empty,
            Arc::new(ManualClock::default()),
            Arc::new(PendingTxAlerts::new(60)),
        )
        .unwrap_err();
        assert_eq!(err, DetectorError::EmptyWatchlist);
    }

    #[test]
    fn drops_candidates_before_first_pulse() {
        let (_clock, detector) = detector(60, 5);
        assert!(!detector.is_anchored());

        ingest_batch(&detector, MAKER, 6);

        let findings = detector.on_settlement(&pulse(100, &[]));
        assert!(findings.is_empty());
        assert!(detector.is_anchored());
        assert_eq!(
            detector.pending_depth(&AccountAddress::new(MAKER)),
            Some(0)
        );
    }

    #[test]
    fn attributes_candidate_to_exactly_one_account() {
        let (_clock, detector) = detector(60, 5);
        detector.on_settlement(&pulse(100, &[]));

        detector.ingest(candidate("0xaa", MAKER));
        detector.on_settlement(&pulse(101, &[]));

        assert_eq!(
            detector.pending_depth(&AccountAddress::new(MAKER)),
            Some(1)
        );
        assert_eq!(
            detector.pending_depth(&AccountAddress::new(ARBITRAGEUR)),
            Some(0)
        );
    }

    #[test]
    fn ignores_unwatched_addresses() {
        let (_clock, detector) = detector(60, 5);
        detector.on_settlement(&pulse(100, &[]));

        ingest_batch(&detector, STRANGER, 6);

        let findings = detector.on_settlement(&pulse(101, &[]));
        assert!(findings.is_empty());
        assert_eq!(
            detector.pending_depth(&AccountAddress::new(MAKER)),
            Some(0)
        );
        assert_eq!(
            detector.pending_depth(&AccountAddress::new(ARBITRAGEUR)),
            Some(0)
        );
        assert_eq!(detector.pending_depth(&AccountAddress::new(STRANGER)), None);
    }

    #[test]
    fn alerts_when_pending_count_exceeds_threshold_within_window() {
        let (clock, detector) = detector(60, 5);
        detector.on_settlement(&pulse(100, &[]));

        clock.advance_secs(5);
        ingest_batch(&detector, MAKER, 6);

        let findings = detector.on_settlement(&pulse(110, &[]));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].metadata["account_name"], "maker");
        assert_eq!(findings[0].metadata["account_address"], MAKER);
        assert_eq!(findings[0].metadata["num_pending"], "6");
    }

    #[test]
    fn evicts_stale_records_without_alerting() {
        let (clock, detector) = detector(60, 5);
        detector.on_settlement(&pulse(100, &[]));

        clock.advance_secs(5);
        ingest_batch(&detector, MAKER, 6);
        let findings = detector.on_settlement(&pulse(110, &[]));
        assert_eq!(findings.len(), 1);

        // All six records carry timestamp 105 < 200 - 60, so they age out
        // before any count check.
        let findings = detector.on_settlement(&pulse(200, &[]));
        assert!(findings.is_empty());
        assert_eq!(
            detector.pending_depth(&AccountAddress::new(MAKER)),
            Some(0)
        );
    }

    #[test]
    fn stale_burst_never_alerts() {
        let (clock, detector) = detector(60, 5);
        detector.on_settlement(&pulse(100, &[]));

        ingest_batch(&detector, MAKER, 6);

        // The burst is first evaluated on a pulse that already postdates the
        // window, so it evicts before any count check.
        clock.advance_secs(120);
        let findings = detector.on_settlement(&pulse(220, &[]));
        assert!(findings.is_empty());
        assert_eq!(
            detector.pending_depth(&AccountAddress::new(MAKER)),
            Some(0)
        );
    }

    #[test]
    fn confirmed_hashes_reduce_pending_below_threshold() {
        let (_clock, detector) = detector(60, 5);
        detector.on_settlement(&pulse(100, &[]));

        ingest_batch(&detector, ARBITRAGEUR, 6);
        let findings = detector.on_settlement(&pulse(101, &[]));
        assert_eq!(findings.len(), 1);

        // Two of the six settle while still inside the window.
        let findings = detector.on_settlement(&pulse(102, &["0x0", "0x1"]));
        assert!(findings.is_empty());
        assert_eq!(
            detector.pending_depth(&AccountAddress::new(ARBITRAGEUR)),
            Some(4)
        );
    }

    #[test]
    fn does_not_alert_exactly_at_threshold() {
        let (_clock, detector) = detector(60, 5);
        detector.on_settlement(&pulse(100, &[]));

        ingest_batch(&detector, MAKER, 5);
        let findings = detector.on_settlement(&pulse(101, &[]));
        assert!(findings.is_empty());

        detector.ingest(candidate("0xbeef", MAKER));
        let findings = detector.on_settlement(&pulse(102, &[]));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].metadata["num_pending"], "6");
    }

    #[test]
    fn interpolated_timestamps_respect_the_eviction_boundary() {
        let (clock, detector) = detector(60, 0);
        detector.on_settlement(&pulse(100, &[]));

        // Observed 30s after the anchor, so stamped at 130.
        clock.advance_secs(30);
        detector.ingest(candidate("0xabc", MAKER));

        // Horizon at 190 - 60 = 130: the record is exactly at the boundary
        // and must survive (eviction is strictly-older-than).
        let findings = detector.on_settlement(&pulse(190, &[]));
        assert_eq!(findings.len(), 1);
        assert_eq!(
            detector.pending_depth(&AccountAddress::new(MAKER)),
            Some(1)
        );

        // One second later it is strictly outside and ages out.
        let findings = detector.on_settlement(&pulse(191, &[]));
        assert!(findings.is_empty());
        assert_eq!(
            detector.pending_depth(&AccountAddress::new(MAKER)),
            Some(0)
        );
    }

    #[test]
    fn candidates_staged_during_a_pulse_wait_for_the_next_one() {
        let (_clock, detector) = detector(60, 0);
        detector.on_settlement(&pulse(100, &[]));

        detector.ingest(candidate("0x1", MAKER));
        let findings = detector.on_settlement(&pulse(101, &[]));
        assert_eq!(findings.len(), 1);

        // Staged after the drain above; only visible on the next pulse.
        detector.ingest(candidate("0x2", MAKER));
        assert_eq!(
            detector.pending_depth(&AccountAddress::new(MAKER)),
            Some(1)
        );
        detector.on_settlement(&pulse(102, &[]));
        assert_eq!(
            detector.pending_depth(&AccountAddress::new(MAKER)),
            Some(2)
        );
    }

    #[test]
    fn eviction_preserves_newer_records_behind_a_stale_front() {
        let (clock, detector) = detector(60, 0);
        detector.on_settlement(&pulse(100, &[]));

        detector.ingest(candidate("0xold", MAKER));
        detector.on_settlement(&pulse(101, &[]));

        // Second record lands 55s later; the first is stale at the final
        // pulse but the second is still in-window and must survive the
        // front-eviction scan.
        clock.advance_secs(55);
        detector.ingest(candidate("0xnew", MAKER));
        detector.on_settlement(&pulse(157, &[]));

        let findings = detector.on_settlement(&pulse(165, &[]));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].metadata["num_pending"], "1");
        assert_eq!(
            detector.pending_depth(&AccountAddress::new(MAKER)),
            Some(1)
        );
    }
}
