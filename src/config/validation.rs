//! Configuration validation.
//!
//! Serde handles syntax; this module checks values (parseable URLs and
//! addresses, non-zero timeouts). All errors are returned, not just the first.

use alloy::primitives::Address;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let chain = &config.blockchain;
    if chain.rpc_url.parse::<url::Url>().is_err() {
        errors.push(ValidationError::new(
            "blockchain.rpc_url",
            format!("'{}' is not a valid URL", chain.rpc_url),
        ));
    }
    for (i, failover) in chain.failover_urls.iter().enumerate() {
        if failover.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new(
                &format!("blockchain.failover_urls[{}]", i),
                format!("'{}' is not a valid URL", failover),
            ));
        }
    }
    if chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("blockchain.rpc_timeout_secs", "must be greater than 0"));
    }
    if chain.gas_price_multiplier < 1.0 {
        errors.push(ValidationError::new(
            "blockchain.gas_price_multiplier",
            "must be at least 1.0",
        ));
    }

    if config.wallet.poll_interval_ms == 0 {
        errors.push(ValidationError::new("wallet.poll_interval_ms", "must be greater than 0"));
    }

    let ledger = &config.ledger;
    if ledger.contract_address.parse::<Address>().is_err() {
        errors.push(ValidationError::new(
            "ledger.contract_address",
            format!("'{}' is not a valid address", ledger.contract_address),
        ));
    }
    if ledger.confirmation_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "ledger.confirmation_timeout_secs",
            "must be greater than 0",
        ));
    }
    if ledger.poll_interval_ms == 0 {
        errors.push(ValidationError::new("ledger.poll_interval_ms", "must be greater than 0"));
    }

    if config.storage.path.trim().is_empty() {
        errors.push(ValidationError::new("storage.path", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
