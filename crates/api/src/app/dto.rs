//! Request/response DTOs and boundary validation.
//!
//! Requests are decoded into typed shapes and validated here; the engine
//! only ever sees well-formed commands.

use axum::response::Response;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use tally_core::{AccountId, TransactionType};

use crate::app::errors;

pub const INVALID_TRANSACTION_AMOUNT_MESSAGE: &str =
    "Transaction amount should be greater than 0";
pub const INVALID_TRANSACTION_TYPE_MESSAGE: &str = "Unsupported transaction type";
pub const NOT_NULLABLE_ACCOUNT_ID_MESSAGE: &str = "Source account id cannot be null";
pub const SAME_ACCOUNT_TRANSFER_MESSAGE: &str = "Source and destination accounts must differ";
pub const MISSING_NAME_MESSAGE: &str = "Account name and surname are required";

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
    pub surname: String,
}

impl CreateAccountRequest {
    pub fn validate(&self) -> Result<(), Response> {
        if self.name.trim().is_empty() || self.surname.trim().is_empty() {
            return Err(errors::validation_error(MISSING_NAME_MESSAGE));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub source_account_id: Option<i64>,
    pub destination_account_id: i64,
    pub amount: Decimal,
    pub transaction_type: String,
}

/// A validated, well-formed mutation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionCommand {
    Deposit {
        destination: AccountId,
        amount: Decimal,
    },
    Withdraw {
        destination: AccountId,
        amount: Decimal,
    },
    Transfer {
        source: AccountId,
        destination: AccountId,
        amount: Decimal,
    },
}

impl CreateTransactionRequest {
    /// Validate and convert into a typed command.
    pub fn into_command(self) -> Result<TransactionCommand, Response> {
        let Some(transaction_type) = TransactionType::parse(&self.transaction_type) else {
            return Err(errors::validation_error(INVALID_TRANSACTION_TYPE_MESSAGE));
        };
        if self.amount <= Decimal::ZERO {
            return Err(errors::validation_error(INVALID_TRANSACTION_AMOUNT_MESSAGE));
        }

        let destination = AccountId::new(self.destination_account_id);
        match transaction_type {
            TransactionType::Deposit => Ok(TransactionCommand::Deposit {
                destination,
                amount: self.amount,
            }),
            TransactionType::Withdraw => Ok(TransactionCommand::Withdraw {
                destination,
                amount: self.amount,
            }),
            TransactionType::Transfer => {
                let Some(source) = self.source_account_id else {
                    return Err(errors::validation_error(NOT_NULLABLE_ACCOUNT_ID_MESSAGE));
                };
                if source == self.destination_account_id {
                    return Err(errors::validation_error(SAME_ACCOUNT_TRANSFER_MESSAGE));
                }
                Ok(TransactionCommand::Transfer {
                    source: AccountId::new(source),
                    destination,
                    amount: self.amount,
                })
            }
        }
    }
}

/// Query parameters of `GET /api/transactions`.
///
/// `account-id` is required. `from` and `to` each bound only their own side
/// of the execution-time window, inclusively.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsParams {
    #[serde(rename = "account-id")]
    pub account_id: i64,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}
