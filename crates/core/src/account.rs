//! Account type.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::id::AccountId;

/// A ledger account.
///
/// `balance` is a fixed-point decimal and never goes below zero at any commit
/// point; only the transaction executor mutates it. `name` and `surname` are
/// display fields the engine treats as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: Decimal,
    pub name: String,
    pub surname: String,
}
