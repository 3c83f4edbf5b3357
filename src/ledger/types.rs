//! Ledger record types and unit conversions.

use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// Display format for record timestamps (en-US `toLocaleString` style).
pub const TIMESTAMP_DISPLAY_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// Fractional digits of one ether.
const ETHER_DECIMALS: usize = 18;

/// A record exactly as the ledger contract returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransfer {
    pub sender: Address,
    pub receiver: Address,
    /// Amount in wei (18-decimal fixed point).
    pub amount: U256,
    pub message: String,
    /// Block timestamp in seconds.
    pub timestamp: U256,
    pub keyword: String,
}

/// Fields appended to the ledger by `addToBlockchain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub receiver: Address,
    /// Amount in wei.
    pub amount: U256,
    pub message: String,
    pub keyword: String,
}

/// A ledger record prepared for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub address_from: Address,
    pub address_to: Address,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub keyword: String,
    /// Exact decimal ether amount, trailing zeros trimmed.
    pub amount_ether: String,
}

impl TransactionRecord {
    /// Convert a raw ledger record.
    ///
    /// Fails only if the timestamp does not fit a calendar date.
    pub fn from_raw(raw: &RawTransfer) -> BlockchainResult<Self> {
        let timestamp = u64::try_from(raw.timestamp)
            .ok()
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .ok_or_else(|| {
                BlockchainError::Decode(format!("Timestamp {} is out of range", raw.timestamp))
            })?;

        Ok(Self {
            address_from: raw.sender,
            address_to: raw.receiver,
            timestamp,
            message: raw.message.clone(),
            keyword: raw.keyword.clone(),
            amount_ether: format_amount(raw.amount),
        })
    }

    /// Timestamp rendered like `11/14/2023, 10:13:20 PM` (UTC).
    pub fn timestamp_display(&self) -> String {
        self.timestamp.format(TIMESTAMP_DISPLAY_FORMAT).to_string()
    }
}

/// Render a wei amount as ether without trailing zeros.
pub fn format_amount(wei: U256) -> String {
    let formatted = format_ether(wei);
    match formatted.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                whole.to_string()
            } else {
                format!("{}.{}", whole, fraction)
            }
        }
        None => formatted,
    }
}

/// Parse a user-entered ether amount into wei.
///
/// The amount must be a positive decimal with at most 18 fractional digits.
pub fn parse_amount(value: &str) -> Result<U256, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("amount is empty".to_string());
    }
    if trimmed.starts_with('-') {
        return Err("amount must be positive".to_string());
    }
    if let Some((_, fraction)) = trimmed.split_once('.') {
        if fraction.len() > ETHER_DECIMALS {
            return Err(format!("at most {} fractional digits", ETHER_DECIMALS));
        }
    }

    let wei = parse_ether(trimmed).map_err(|e| e.to_string())?;
    if wei.is_zero() {
        return Err("amount must be greater than zero".to_string());
    }
    Ok(wei)
}
