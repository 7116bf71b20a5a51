//! The transaction executor.
//!
//! Sole writer of account balances and sole inserter of transaction records.
//! Each operation is one atomic unit of work: it locks the accounts it will
//! mutate (two-account operations in canonical order), validates
//! preconditions under the locks, applies the balance mutations, appends the
//! record and commits. Every failure path rolls back; no partial mutation is
//! ever observable.

use rust_decimal::Decimal;
use tracing::instrument;

use tally_core::{AccountId, LedgerError, LedgerResult, NewTransaction};

use crate::lock_order::lock_order;
use crate::store::{LedgerStore, LedgerUow};

/// Executes deposit, withdraw and transfer against an injected store.
#[derive(Debug, Clone)]
pub struct TransactionExecutor<S> {
    store: S,
}

impl<S> TransactionExecutor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: LedgerStore> TransactionExecutor<S> {
    /// Credit `amount` to `destination` and append a DEPOSIT record.
    #[instrument(skip(self), err)]
    pub async fn deposit(&self, destination: AccountId, amount: Decimal) -> LedgerResult<()> {
        check_amount(amount)?;

        let mut uow = self.store.begin().await?;
        if uow.lock_account(destination).await?.is_none() {
            uow.rollback().await?;
            return Err(LedgerError::AccountNotFound);
        }

        uow.increase_balance(destination, amount).await?;
        uow.insert_record(&NewTransaction::deposit(destination, amount))
            .await?;
        uow.commit().await
    }

    /// Debit `amount` from `destination` and append a WITHDRAW record.
    #[instrument(skip(self), err)]
    pub async fn withdraw(&self, destination: AccountId, amount: Decimal) -> LedgerResult<()> {
        check_amount(amount)?;

        let mut uow = self.store.begin().await?;
        let Some(account) = uow.lock_account(destination).await? else {
            uow.rollback().await?;
            return Err(LedgerError::AccountNotFound);
        };
        if account.balance < amount {
            uow.rollback().await?;
            return Err(LedgerError::InsufficientFunds);
        }

        uow.decrease_balance(destination, amount).await?;
        uow.insert_record(&NewTransaction::withdraw(destination, amount))
            .await?;
        uow.commit().await
    }

    /// Move `amount` from `source` to `destination` and append a TRANSFER
    /// record.
    ///
    /// Row locks are acquired in canonical ascending-id order, so a
    /// concurrent opposite transfer over the same pair cannot deadlock
    /// against this one. If the first locked account is missing, the second
    /// lock is never taken.
    #[instrument(skip(self), err)]
    pub async fn transfer(
        &self,
        source: AccountId,
        destination: AccountId,
        amount: Decimal,
    ) -> LedgerResult<()> {
        check_amount(amount)?;
        if source == destination {
            return Err(LedgerError::technical(
                "transfer source and destination must differ",
            ));
        }

        let (first, second) = lock_order(source, destination);

        let mut uow = self.store.begin().await?;
        let Some(first_row) = uow.lock_account(first).await? else {
            uow.rollback().await?;
            return Err(LedgerError::AccountNotFound);
        };
        let Some(second_row) = uow.lock_account(second).await? else {
            uow.rollback().await?;
            return Err(LedgerError::AccountNotFound);
        };

        // Acquisition order says nothing about roles; the source row is
        // whichever locked row carries the source id.
        let source_row = if first_row.id == source {
            &first_row
        } else {
            &second_row
        };
        if source_row.balance < amount {
            uow.rollback().await?;
            return Err(LedgerError::InsufficientFunds);
        }

        uow.decrease_balance(source, amount).await?;
        uow.increase_balance(destination, amount).await?;
        uow.insert_record(&NewTransaction::transfer(source, destination, amount))
            .await?;
        uow.commit().await
    }
}

// Positivity is enforced at the boundary; a non-positive amount here is
// undefined input and must never reach a balance update.
fn check_amount(amount: Decimal) -> LedgerResult<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::technical("non-positive transaction amount"));
    }
    Ok(())
}
