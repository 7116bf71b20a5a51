//! Ledger error model.

use thiserror::Error;

/// Result type used across the ledger engine.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Outcome of a ledger operation that did not succeed.
///
/// `AccountNotFound` and `InsufficientFunds` are expected business outcomes
/// callers branch on; `Technical` covers unexpected storage failures. The
/// displayed messages are part of the external contract and must stay stable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A referenced account id does not exist at lock time.
    #[error("Requested account doesn't exist")]
    AccountNotFound,

    /// The charged account's balance cannot cover the requested amount.
    #[error("Insufficient funds on the account to charge")]
    InsufficientFunds,

    /// Unexpected storage failure. The carried detail is for internal logs
    /// only and never reaches the external message.
    #[error("Technical error")]
    Technical(String),
}

impl LedgerError {
    pub fn technical(detail: impl Into<String>) -> Self {
        Self::Technical(detail.into())
    }

    /// Internal detail, if this is a technical failure.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Technical(detail) => Some(detail),
            _ => None,
        }
    }
}
