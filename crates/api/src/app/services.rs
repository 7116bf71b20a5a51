//! Engine wiring over the shared connection pool.

use sqlx::PgPool;

use tally_ledger::{HistoryQueryService, PostgresLedgerStore, TransactionExecutor};

/// Shared services handed to every handler.
///
/// The pool is the only shared resource; executor and history service each
/// receive their own handle to the same store. No process-wide singletons.
pub struct AppServices {
    pub store: PostgresLedgerStore,
    pub executor: TransactionExecutor<PostgresLedgerStore>,
    pub history: HistoryQueryService<PostgresLedgerStore>,
}

impl AppServices {
    pub fn new(pool: PgPool) -> Self {
        let store = PostgresLedgerStore::new(pool);
        Self {
            executor: TransactionExecutor::new(store.clone()),
            history: HistoryQueryService::new(store.clone()),
            store,
        }
    }
}
