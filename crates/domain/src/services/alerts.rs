use std::collections::BTreeMap;

use chrono::Utc;

use crate::model::{AccountAddress, Finding, Severity};

/// Builds the structured finding emitted when an account exceeds its pending
/// transaction budget. Implementations must be pure construction — no I/O —
/// so the detection engine can be tested independently of alert formatting.
pub trait AlertEmitter: Send + Sync {
    fn emit(&self, account_name: &str, address: &AccountAddress, num_pending: usize) -> Finding;
}

/// Production emitter for the high-pending-transaction alert.
#[derive(Debug, Clone)]
pub struct PendingTxAlerts {
    window_seconds: u64,
}

impl PendingTxAlerts {
    pub const ALERT_ID: &'static str = "MEMPOOL-HIGH-PENDING-TX";

    pub fn new(window_seconds: u64) -> Self {
        Self { window_seconds }
    }
}

impl AlertEmitter for PendingTxAlerts {
    fn emit(&self, account_name: &str, address: &AccountAddress, num_pending: usize) -> Finding {
        let mut metadata = BTreeMap::new();
        metadata.insert("account_name".to_string(), account_name.to_string());
        metadata.insert(
            "account_address".to_string(),
            address.as_str().to_string(),
        );
        metadata.insert("num_pending".to_string(), num_pending.to_string());

        Finding {
            alert_id: Self::ALERT_ID.to_string(),
            name: "High Pending Transaction Count".to_string(),
            description: format!(
                "The {} account had {} pending transactions in the last {} seconds",
                account_name, num_pending, self.window_seconds
            ),
            severity: Severity::Low,
            metadata,
            emitted_at: Utc::now(),
        }
    }
}
