//! Time-ranged transaction history, merged from both directions.

use chrono::{DateTime, Utc};
use tracing::instrument;

use tally_core::{AccountId, LedgerResult, TransactionRecord};

use crate::store::{LedgerStore, LedgerUow};

/// Answers transaction history queries for one account.
#[derive(Debug, Clone)]
pub struct HistoryQueryService<S> {
    store: S,
}

impl<S> HistoryQueryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: LedgerStore> HistoryQueryService<S> {
    /// All transactions touching `account` whose execution time falls inside
    /// the inclusive `[from, to]` window, ascending by execution time.
    ///
    /// Both directional fetches run inside one snapshot unit of work, so a
    /// concurrent commit is either visible in the whole merge or not at all.
    #[instrument(skip(self), err)]
    pub async fn list_transactions(
        &self,
        account: AccountId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> LedgerResult<Vec<TransactionRecord>> {
        let mut uow = self.store.begin_snapshot().await?;
        let mut records = uow.outgoing(account, from, to).await?;
        let incoming = uow.incoming(account, from, to).await?;
        uow.commit().await?;

        records.extend(incoming);
        // Id as tie-break keeps equal-timestamp records in insertion order.
        records.sort_by_key(|r| (r.execution_time, r.id));
        Ok(records)
    }
}
