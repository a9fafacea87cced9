//! Library entrypoint for embedding the pending-transaction monitor inside
//! other binaries. The binary in `main.rs` remains available for standalone
//! deployment.

pub mod anchor;
pub mod detector;
pub mod feed;
pub mod rpc;
pub mod worker;

pub use anchor::{Clock, SystemClock, TimeAnchor};
pub use detector::{
    CandidateTx, Detector, DetectorError, SettlementPulse, WindowConfig,
};
pub use feed::{ChainFeed, FeedStreams, RpcChainFeed};
pub use rpc::RpcClient;
pub use worker::{run_monitor, MonitorError};
