//! Transaction records and their wire representation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::id::{AccountId, TransactionId};

/// Kind of balance-mutating operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Deposit,
    Withdraw,
    Transfer,
}

impl TransactionType {
    /// Stable wire/storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdraw => "WITHDRAW",
            TransactionType::Transfer => "TRANSFER",
        }
    }

    /// Parse the stable name; `None` for unrecognized input.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DEPOSIT" => Some(TransactionType::Deposit),
            "WITHDRAW" => Some(TransactionType::Withdraw),
            "TRANSFER" => Some(TransactionType::Transfer),
            _ => None,
        }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transaction about to be appended.
///
/// Carries no id or execution time; the store assigns both at commit.
/// Deposits and withdrawals have no source account; transfers have both
/// sides, distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub source_account_id: Option<AccountId>,
    pub destination_account_id: AccountId,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
}

impl NewTransaction {
    pub fn deposit(destination: AccountId, amount: Decimal) -> Self {
        Self {
            source_account_id: None,
            destination_account_id: destination,
            amount,
            transaction_type: TransactionType::Deposit,
        }
    }

    pub fn withdraw(destination: AccountId, amount: Decimal) -> Self {
        Self {
            source_account_id: None,
            destination_account_id: destination,
            amount,
            transaction_type: TransactionType::Withdraw,
        }
    }

    pub fn transfer(source: AccountId, destination: AccountId, amount: Decimal) -> Self {
        Self {
            source_account_id: Some(source),
            destination_account_id: destination,
            amount,
            transaction_type: TransactionType::Transfer,
        }
    }
}

/// A committed transaction record (immutable, append-only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub source_account_id: Option<AccountId>,
    pub destination_account_id: AccountId,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub execution_time: DateTime<Utc>,
}
