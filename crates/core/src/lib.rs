//! `tally-core` — domain foundation for the ledger.
//!
//! This crate contains **pure domain** types (no infrastructure concerns):
//! identifiers, accounts, transaction records and the business error model.

pub mod account;
pub mod error;
pub mod id;
pub mod transaction;

pub use account::Account;
pub use error::{LedgerError, LedgerResult};
pub use id::{AccountId, TransactionId};
pub use transaction::{NewTransaction, TransactionRecord, TransactionType};
