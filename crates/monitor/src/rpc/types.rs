//! Wire types for the node's JSON-RPC surface.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<T> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    pub params: T,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// The latest block, queried with hydrated transactions disabled so the
/// `transactions` field carries hashes only.
#[derive(Debug, Deserialize)]
pub struct BlockSnapshot {
    /// Hex quantity, e.g. `0x10d4f`.
    pub number: String,
    /// Hex quantity, unix seconds.
    pub timestamp: String,
    #[serde(default)]
    pub transactions: Vec<String>,
}

/// `txpool_content` result: pending transactions grouped by sender, then by
/// nonce. The queued side is ignored; queued transactions cannot be mined
/// yet and are not candidates.
#[derive(Debug, Deserialize, Default)]
pub struct TxpoolContent {
    #[serde(default)]
    pub pending: BTreeMap<String, BTreeMap<String, TxpoolEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct TxpoolEntry {
    pub hash: String,
    pub from: String,
}

/// Decodes a `0x`-prefixed hex quantity.
pub fn parse_hex_quantity(raw: &str) -> Option<i64> {
    let body = raw.strip_prefix("0x")?;
    i64::from_str_radix(body, 16).ok()
}
