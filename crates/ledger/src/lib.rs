//! `tally-ledger` — the ledger transaction engine.
//!
//! Everything that moves money lives here: the store seam with its Postgres
//! and in-memory backends, the deadlock-free lock-ordering rule, the
//! transaction executor and the history query service. The executor is the
//! sole writer of balances and the sole inserter of transaction records.

pub mod executor;
pub mod history;
pub mod lock_order;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use executor::TransactionExecutor;
pub use history::HistoryQueryService;
pub use store::{
    InMemoryLedgerStore, LedgerStore, LedgerUow, LockedAccount, PostgresLedgerStore,
};

/// Run the ledger schema migrations against the given pool.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
