//! Environment-driven configuration for the monitor binary, plus the
//! watchlist of accounts whose pending transactions are tracked.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::model::{AccountAddress, AddressFormatError};

const DEFAULT_WINDOW_SECONDS: u64 = 60;
const DEFAULT_TX_THRESHOLD: usize = 10;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Key configuration derived from `.env`/process variables so the monitor
/// binary has a deterministic environment contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    rpc_url: String,
    watchlist_path: String,
    window_seconds: u64,
    tx_threshold: usize,
    poll_interval_ms: u64,
}

impl MonitorConfig {
    /// Loads configuration by hydrating `.env` (if present) and reading the
    /// required process variables. Missing or malformed entries surface as
    /// `ConfigError` so the binary can respond gracefully.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        Ok(Self {
            rpc_url: get_required_var("MONITOR_RPC_URL")?,
            watchlist_path: get_required_var("MONITOR_WATCHLIST_PATH")?,
            window_seconds: get_optional_number("MONITOR_WINDOW_SECONDS")?
                .unwrap_or(DEFAULT_WINDOW_SECONDS),
            tx_threshold: get_optional_number("MONITOR_TX_THRESHOLD")?
                .unwrap_or(DEFAULT_TX_THRESHOLD),
            poll_interval_ms: get_optional_number("MONITOR_POLL_INTERVAL_MS")?
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn watchlist_path(&self) -> &str {
        &self.watchlist_path
    }

    pub fn window_seconds(&self) -> u64 {
        self.window_seconds
    }

    pub fn tx_threshold(&self) -> usize {
        self.tx_threshold
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms
    }
}

/// A named account on the watchlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchlistEntry {
    pub name: String,
    pub address: AccountAddress,
}

/// The set of accounts to monitor, loaded once at startup from a JSON object
/// mapping display names to `0x` addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watchlist {
    entries: Vec<WatchlistEntry>,
}

impl Watchlist {
    /// Reads and validates the watchlist file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::WatchlistIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw).map_err(|err| err.with_watchlist_path(path))
    }

    /// Parses the `{"name": "0x..."} ` object shape and validates every
    /// address. Addresses must be unique so a transaction can never be
    /// attributed to two accounts.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let parsed: BTreeMap<String, String> =
            serde_json::from_str(raw).map_err(|source| ConfigError::WatchlistParse {
                path: String::new(),
                source,
            })?;

        let mut entries = Vec::with_capacity(parsed.len());
        for (name, address) in parsed {
            let address = AccountAddress::parse(&address)
                .map_err(|source| ConfigError::InvalidAddress {
                    name: name.clone(),
                    source,
                })?;
            entries.push(WatchlistEntry { name, address });
        }
        Self::from_entries(entries)
    }

    /// Builds a watchlist from pre-validated entries, still enforcing
    /// address uniqueness.
    pub fn from_entries(entries: Vec<WatchlistEntry>) -> Result<Self, ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.address.clone()) {
                return Err(ConfigError::DuplicateAddress {
                    address: entry.address.as_str().to_string(),
                });
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[WatchlistEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn get_required_var(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(ConfigError::MissingVar { key })
            } else {
                Ok(trimmed.to_string())
            }
        }
        Err(_) => Err(ConfigError::MissingVar { key }),
    }
}

fn get_optional_var(key: &'static str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn get_optional_number<T>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    match get_optional_var(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|source| ConfigError::InvalidNumber { key, source }),
        None => Ok(None),
    }
}

pub fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os("MEMPOOL_SENTRY_SKIP_DOTENV").is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(ConfigError::Dotenv { source: err }),
    }

    Ok(())
}

/// Errors emitted when `.env` hydration, environment parsing, or watchlist
/// loading fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{key}`")]
    MissingVar { key: &'static str },
    #[error("invalid integer in `{key}`: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
    #[error("failed to read watchlist `{path}`: {source}")]
    WatchlistIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse watchlist `{path}`: {source}")]
    WatchlistParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid address for watchlist entry `{name}`: {source}")]
    InvalidAddress {
        name: String,
        #[source]
        source: AddressFormatError,
    },
    #[error("duplicate watchlist address `{address}`")]
    DuplicateAddress { address: String },
}

impl ConfigError {
    fn with_watchlist_path(self, path: &Path) -> Self {
        match self {
            Self::WatchlistParse { source, .. } => Self::WatchlistParse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        }
    }
}
