//! Transfer form state and validation.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::coordinator::error::CoordinatorError;
use crate::ledger::types::parse_amount;

/// One input of the transfer form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    AddressTo,
    Amount,
    Keyword,
    Message,
}

impl FormField {
    pub const ALL: [FormField; 4] = [
        FormField::AddressTo,
        FormField::Amount,
        FormField::Keyword,
        FormField::Message,
    ];

    /// Input name as used by form bindings.
    pub fn name(self) -> &'static str {
        match self {
            FormField::AddressTo => "addressTo",
            FormField::Amount => "amount",
            FormField::Keyword => "keyword",
            FormField::Message => "message",
        }
    }
}

impl FromStr for FormField {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormField::ALL
            .into_iter()
            .find(|field| field.name() == s)
            .ok_or_else(|| CoordinatorError::UnknownField(s.to_string()))
    }
}

/// Raw user input, unvalidated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferForm {
    pub address_to: String,
    pub amount: String,
    pub keyword: String,
    pub message: String,
}

/// A form that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTransfer {
    pub to: Address,
    /// Amount in wei.
    pub amount: U256,
    pub keyword: String,
    pub message: String,
}

impl TransferForm {
    /// Replace one field, leaving the others untouched.
    pub fn set(&mut self, field: FormField, value: String) {
        match field {
            FormField::AddressTo => self.address_to = value,
            FormField::Amount => self.amount = value,
            FormField::Keyword => self.keyword = value,
            FormField::Message => self.message = value,
        }
    }

    pub fn get(&self, field: FormField) -> &str {
        match field {
            FormField::AddressTo => &self.address_to,
            FormField::Amount => &self.amount,
            FormField::Keyword => &self.keyword,
            FormField::Message => &self.message,
        }
    }

    /// Check recipient and amount. Keyword and message are free text.
    pub fn validate(&self) -> Result<ValidatedTransfer, CoordinatorError> {
        let to = Address::from_str(self.address_to.trim())
            .map_err(|_| CoordinatorError::InvalidRecipient(self.address_to.clone()))?;
        let amount = parse_amount(&self.amount).map_err(|reason| CoordinatorError::InvalidAmount {
            value: self.amount.clone(),
            reason,
        })?;

        Ok(ValidatedTransfer {
            to,
            amount,
            keyword: self.keyword.clone(),
            message: self.message.clone(),
        })
    }
}
