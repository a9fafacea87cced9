//! Data structures shared between the detector and its collaborators.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Required length (in hex characters, without the `0x` prefix) for account
/// addresses supplied through the watchlist.
pub const ADDRESS_HEX_LENGTH: usize = 40;

/// Errors emitted when externally supplied addresses fail validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressFormatError {
    #[error("address must start with `0x`")]
    MissingPrefix,
    #[error("address must be exactly {ADDRESS_HEX_LENGTH} hex characters after the prefix")]
    WrongLength,
    #[error("address contains non-hex characters")]
    NonHex,
}

/// A `0x`-prefixed account address, canonicalized to lowercase so equality
/// checks are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AccountAddress(String);

impl AccountAddress {
    pub fn new(value: impl Into<String>) -> Self {
        let mut owned = value.into();
        owned.make_ascii_lowercase();
        Self(owned)
    }

    pub fn parse(address: &str) -> Result<Self, AddressFormatError> {
        validate_address(address)?;
        Ok(Self::new(address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<&str> for AccountAddress {
    fn from(value: &str) -> Self {
        Self::new(value.to_owned())
    }
}

/// Validates that the supplied address matches the `0x` + 40 hex contract.
pub fn validate_address(address: &str) -> Result<(), AddressFormatError> {
    let Some(body) = address.strip_prefix("0x") else {
        return Err(AddressFormatError::MissingPrefix);
    };

    if body.len() != ADDRESS_HEX_LENGTH {
        return Err(AddressFormatError::WrongLength);
    }

    if !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AddressFormatError::NonHex);
    }

    Ok(())
}

/// A transaction hash, canonicalized to lowercase. Hashes are treated as
/// opaque identifiers; only equality matters for settlement matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TxHash(String);

impl TxHash {
    pub fn new(value: impl Into<String>) -> Self {
        let mut owned = value.into();
        owned.make_ascii_lowercase();
        Self(owned)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<&str> for TxHash {
    fn from(value: &str) -> Self {
        Self::new(value.to_owned())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, strum_macros::Display,
)]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// A structured alert produced when a monitored account exceeds its pending
/// transaction budget. Serialized to JSON when handed to downstream sinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub alert_id: String,
    pub name: String,
    pub description: String,
    pub severity: Severity,
    pub metadata: BTreeMap<String, String>,
    pub emitted_at: DateTime<Utc>,
}
