//! In-memory ledger store.
//!
//! Intended for tests/dev. Not optimized for performance. Row locks are real
//! per-account async mutexes, so the executor's lock-acquisition discipline
//! is exercised exactly as it is against Postgres: acquiring the same pair
//! in opposite orders can deadlock here too. Writes are staged in the unit
//! of work and applied atomically at commit, which also assigns ids and
//! execution times.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::OwnedMutexGuard;

use tally_core::{
    Account, AccountId, LedgerError, LedgerResult, NewTransaction, TransactionId,
    TransactionRecord,
};

use super::r#trait::{LedgerStore, LedgerUow, LockedAccount};

#[derive(Debug, Clone)]
struct AccountRow {
    balance: Decimal,
    name: String,
    surname: String,
}

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<i64, AccountRow>,
    transactions: Vec<TransactionRecord>,
    next_account_id: i64,
    next_transaction_id: i64,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    row_locks: Mutex<HashMap<AccountId, Arc<tokio::sync::Mutex<()>>>>,
}

impl Inner {
    fn state(&self) -> LedgerResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| LedgerError::technical("state lock poisoned"))
    }
}

/// In-memory implementation of [`LedgerStore`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    inner: Arc<Inner>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn row_lock(&self, id: AccountId) -> LedgerResult<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .inner
            .row_locks
            .lock()
            .map_err(|_| LedgerError::technical("row lock table poisoned"))?;
        Ok(locks.entry(id).or_default().clone())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    type Uow = InMemoryUow;

    async fn begin(&self) -> LedgerResult<InMemoryUow> {
        Ok(InMemoryUow {
            store: self.clone(),
            guards: HashMap::new(),
            staged: Vec::new(),
            snapshot: None,
        })
    }

    async fn begin_snapshot(&self) -> LedgerResult<InMemoryUow> {
        // Capture the committed log once so both directional fetches read
        // the same state no matter what commits in between.
        let snapshot = self.inner.state()?.transactions.clone();
        Ok(InMemoryUow {
            store: self.clone(),
            guards: HashMap::new(),
            staged: Vec::new(),
            snapshot: Some(snapshot),
        })
    }

    async fn create_account(&self, name: &str, surname: &str) -> LedgerResult<AccountId> {
        let mut state = self.inner.state()?;
        state.next_account_id += 1;
        let id = state.next_account_id;
        state.accounts.insert(
            id,
            AccountRow {
                balance: Decimal::ZERO,
                name: name.to_string(),
                surname: surname.to_string(),
            },
        );
        Ok(AccountId::new(id))
    }

    async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        let state = self.inner.state()?;
        Ok(state
            .accounts
            .iter()
            .map(|(id, row)| Account {
                id: AccountId::new(*id),
                balance: row.balance,
                name: row.name.clone(),
                surname: row.surname.clone(),
            })
            .collect())
    }
}

#[derive(Debug)]
enum StagedWrite {
    BalanceDelta { id: AccountId, delta: Decimal },
    Insert(NewTransaction),
}

/// Unit of work over the in-memory store.
///
/// Holds the row locks it acquired; dropping it releases them and discards
/// the staged writes, which is exactly rollback.
pub struct InMemoryUow {
    store: InMemoryLedgerStore,
    guards: HashMap<AccountId, OwnedMutexGuard<()>>,
    staged: Vec<StagedWrite>,
    snapshot: Option<Vec<TransactionRecord>>,
}

#[async_trait]
impl LedgerUow for InMemoryUow {
    async fn lock_account(&mut self, id: AccountId) -> LedgerResult<Option<LockedAccount>> {
        if !self.guards.contains_key(&id) {
            let lock = self.store.row_lock(id)?;
            let guard = lock.lock_owned().await;
            self.guards.insert(id, guard);
        }

        let state = self.store.inner.state()?;
        Ok(state
            .accounts
            .get(&id.as_i64())
            .map(|row| LockedAccount {
                id,
                balance: row.balance,
            }))
    }

    async fn increase_balance(&mut self, id: AccountId, amount: Decimal) -> LedgerResult<()> {
        self.stage_delta(id, amount)
    }

    async fn decrease_balance(&mut self, id: AccountId, amount: Decimal) -> LedgerResult<()> {
        self.stage_delta(id, -amount)
    }

    async fn insert_record(&mut self, record: &NewTransaction) -> LedgerResult<()> {
        let state = self.store.inner.state()?;
        let destination = record.destination_account_id.as_i64();
        if !state.accounts.contains_key(&destination) {
            return Err(LedgerError::technical(format!(
                "destination account {destination} does not exist"
            )));
        }
        if let Some(source) = record.source_account_id {
            if !state.accounts.contains_key(&source.as_i64()) {
                return Err(LedgerError::technical(format!(
                    "source account {source} does not exist"
                )));
            }
        }
        drop(state);
        self.staged.push(StagedWrite::Insert(record.clone()));
        Ok(())
    }

    async fn outgoing(
        &mut self,
        account: AccountId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> LedgerResult<Vec<TransactionRecord>> {
        self.fetch(from, to, |t| t.source_account_id == Some(account))
    }

    async fn incoming(
        &mut self,
        account: AccountId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> LedgerResult<Vec<TransactionRecord>> {
        self.fetch(from, to, |t| t.destination_account_id == account)
    }

    async fn commit(mut self) -> LedgerResult<()> {
        let mut state = self.store.inner.state()?;
        for write in self.staged.drain(..) {
            match write {
                StagedWrite::BalanceDelta { id, delta } => {
                    let row = state.accounts.get_mut(&id.as_i64()).ok_or_else(|| {
                        LedgerError::technical(format!("account {id} vanished before commit"))
                    })?;
                    row.balance += delta;
                }
                StagedWrite::Insert(record) => {
                    state.next_transaction_id += 1;
                    let id = state.next_transaction_id;
                    state.transactions.push(TransactionRecord {
                        id: TransactionId::new(id),
                        source_account_id: record.source_account_id,
                        destination_account_id: record.destination_account_id,
                        amount: record.amount,
                        transaction_type: record.transaction_type,
                        execution_time: Utc::now(),
                    });
                }
            }
        }
        drop(state);
        self.guards.clear();
        Ok(())
    }

    async fn rollback(mut self) -> LedgerResult<()> {
        self.staged.clear();
        self.guards.clear();
        Ok(())
    }
}

impl InMemoryUow {
    fn stage_delta(&mut self, id: AccountId, delta: Decimal) -> LedgerResult<()> {
        let state = self.store.inner.state()?;
        if !state.accounts.contains_key(&id.as_i64()) {
            return Err(LedgerError::technical(format!(
                "account {id} does not exist"
            )));
        }
        drop(state);
        self.staged.push(StagedWrite::BalanceDelta { id, delta });
        Ok(())
    }

    fn fetch(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        matches: impl Fn(&TransactionRecord) -> bool,
    ) -> LedgerResult<Vec<TransactionRecord>> {
        let live;
        let records = match &self.snapshot {
            Some(snapshot) => snapshot,
            None => {
                live = self.store.inner.state()?.transactions.clone();
                &live
            }
        };
        Ok(records
            .iter()
            .filter(|t| matches(t))
            .filter(|t| in_window(t.execution_time, from, to))
            .cloned()
            .collect())
    }
}

fn in_window(at: DateTime<Utc>, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> bool {
    from.is_none_or(|from| from <= at) && to.is_none_or(|to| at <= to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tally_core::TransactionType;

    #[tokio::test]
    async fn staged_writes_are_invisible_until_commit() {
        let store = InMemoryLedgerStore::new();
        let id = store.create_account("Ada", "Lovelace").await.unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.lock_account(id).await.unwrap();
        uow.increase_balance(id, dec!(100)).await.unwrap();

        let accounts = store.list_accounts().await.unwrap();
        assert_eq!(accounts[0].balance, Decimal::ZERO);

        uow.commit().await.unwrap();
        let accounts = store.list_accounts().await.unwrap();
        assert_eq!(accounts[0].balance, dec!(100));
    }

    #[tokio::test]
    async fn dropping_a_unit_of_work_rolls_back() {
        let store = InMemoryLedgerStore::new();
        let id = store.create_account("Ada", "Lovelace").await.unwrap();

        {
            let mut uow = store.begin().await.unwrap();
            uow.lock_account(id).await.unwrap();
            uow.increase_balance(id, dec!(50)).await.unwrap();
            uow.insert_record(&NewTransaction::deposit(id, dec!(50)))
                .await
                .unwrap();
            // No commit.
        }

        let accounts = store.list_accounts().await.unwrap();
        assert_eq!(accounts[0].balance, Decimal::ZERO);

        let mut uow = store.begin_snapshot().await.unwrap();
        let incoming = uow.incoming(id, None, None).await.unwrap();
        assert!(incoming.is_empty());
    }

    #[tokio::test]
    async fn dropped_locks_are_released() {
        let store = InMemoryLedgerStore::new();
        let id = store.create_account("Ada", "Lovelace").await.unwrap();

        {
            let mut uow = store.begin().await.unwrap();
            uow.lock_account(id).await.unwrap();
        }

        // Would hang forever if the guard leaked.
        let mut uow = store.begin().await.unwrap();
        assert!(uow.lock_account(id).await.unwrap().is_some());
        uow.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn commit_assigns_monotonic_ids_and_execution_times() {
        let store = InMemoryLedgerStore::new();
        let id = store.create_account("Ada", "Lovelace").await.unwrap();

        for _ in 0..3 {
            let mut uow = store.begin().await.unwrap();
            uow.lock_account(id).await.unwrap();
            uow.increase_balance(id, dec!(1)).await.unwrap();
            uow.insert_record(&NewTransaction::deposit(id, dec!(1)))
                .await
                .unwrap();
            uow.commit().await.unwrap();
        }

        let mut uow = store.begin_snapshot().await.unwrap();
        let records = uow.incoming(id, None, None).await.unwrap();
        uow.rollback().await.unwrap();

        assert_eq!(records.len(), 3);
        assert!(records.windows(2).all(|w| w[0].id < w[1].id));
        assert!(
            records
                .windows(2)
                .all(|w| w[0].execution_time <= w[1].execution_time)
        );
        assert!(
            records
                .iter()
                .all(|r| r.transaction_type == TransactionType::Deposit)
        );
    }
}
