//! Canonical lock-ordering rule for two-account operations.

use tally_core::AccountId;

/// Order a pair of account ids for lock acquisition.
///
/// The numerically smaller id is locked first, regardless of which side is
/// the source. Two concurrent operations touching the same pair therefore
/// acquire their row locks in the same order and cannot deadlock, with no
/// detection or retry machinery.
pub fn lock_order(a: AccountId, b: AccountId) -> (AccountId, AccountId) {
    if a <= b { (a, b) } else { (b, a) }
}
