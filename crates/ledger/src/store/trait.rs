//! The storage seam the engine is written against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use tally_core::{Account, AccountId, LedgerResult, NewTransaction, TransactionRecord};

/// An account row observed under its row lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedAccount {
    pub id: AccountId,
    pub balance: Decimal,
}

/// Persistent storage of accounts and transactions.
///
/// `begin` opens an atomic unit of work; every balance mutation and record
/// insert happens inside one. Account creation and listing are
/// single-statement conveniences with no invariants beyond insertion.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Uow: LedgerUow;

    /// Open an atomic unit of work.
    async fn begin(&self) -> LedgerResult<Self::Uow>;

    /// Open a unit of work whose reads all observe one consistent snapshot,
    /// so a concurrent commit cannot appear in only half of a multi-part
    /// read.
    async fn begin_snapshot(&self) -> LedgerResult<Self::Uow>;

    /// Insert a new account with zero balance, returning its id.
    async fn create_account(&self, name: &str, surname: &str) -> LedgerResult<AccountId>;

    /// All accounts, in id order.
    async fn list_accounts(&self) -> LedgerResult<Vec<Account>>;
}

/// One atomic unit of work against the ledger store.
///
/// Dropping a unit of work without committing rolls back every write
/// performed through it.
#[async_trait]
pub trait LedgerUow: Send {
    /// Acquire the row lock for `id` and read the row under it, or `None`
    /// if the account does not exist.
    async fn lock_account(&mut self, id: AccountId) -> LedgerResult<Option<LockedAccount>>;

    /// `balance += amount` for an existing, already locked account.
    async fn increase_balance(&mut self, id: AccountId, amount: Decimal) -> LedgerResult<()>;

    /// `balance -= amount` for an existing, already locked account.
    async fn decrease_balance(&mut self, id: AccountId, amount: Decimal) -> LedgerResult<()>;

    /// Append a transaction record. The store assigns the id and the
    /// execution time at commit.
    async fn insert_record(&mut self, record: &NewTransaction) -> LedgerResult<()>;

    /// Transactions where `account` is the source, bounded by the inclusive
    /// `from`/`to` execution-time window (absent bound = unbounded).
    async fn outgoing(
        &mut self,
        account: AccountId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> LedgerResult<Vec<TransactionRecord>>;

    /// Transactions where `account` is the destination; same window rules.
    async fn incoming(
        &mut self,
        account: AccountId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> LedgerResult<Vec<TransactionRecord>>;

    async fn commit(self) -> LedgerResult<()>;

    async fn rollback(self) -> LedgerResult<()>;
}
