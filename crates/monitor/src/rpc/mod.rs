//! Minimal JSON-RPC client for the two node calls the monitor needs: the
//! latest block (settlement pulses) and the transaction pool (candidates).

use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::worker::MonitorError;

mod types;

pub use types::{
    parse_hex_quantity, BlockSnapshot, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    TxpoolContent, TxpoolEntry,
};

pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<R, MonitorError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: method.to_string(),
            params,
        };

        let response: JsonRpcResponse<R> = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(MonitorError::Rpc(format!(
                "{} failed: {} (code {})",
                method, error.message, error.code
            )));
        }

        response
            .result
            .ok_or_else(|| MonitorError::Rpc(format!("{} returned an empty result", method)))
    }

    /// Latest block header with transaction hashes only.
    pub async fn latest_block(&self) -> Result<BlockSnapshot, MonitorError> {
        self.call("eth_getBlockByNumber", ("latest", false)).await
    }

    /// Full pending side of the transaction pool.
    pub async fn txpool_content(&self) -> Result<TxpoolContent, MonitorError> {
        self.call("txpool_content", [(); 0]).await
    }
}
