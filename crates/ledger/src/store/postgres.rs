//! Postgres-backed ledger store.
//!
//! Row locks come from `SELECT ... FOR UPDATE`; balance updates are relative
//! (`balance = balance + $1`) so the database applies them under the same
//! lock; snapshot units of work run at REPEATABLE READ so the two
//! directional history fetches share one snapshot and a concurrent commit
//! cannot appear in only half of the merge.
//!
//! ## Error Mapping
//!
//! Every sqlx failure funnels through [`map_sqlx_error`], which logs the full
//! detail (operation, driver error) and surfaces the generic `Technical`
//! business error. Constraint violations, pool exhaustion and lock-wait
//! expiry all land in the same bucket: none of them is a business outcome.
//!
//! ## Thread Safety
//!
//! `PostgresLedgerStore` is `Send + Sync`; it holds a `PgPool`, which manages
//! connections internally and is cheap to clone.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use tracing::instrument;

use tally_core::{
    Account, AccountId, LedgerError, LedgerResult, NewTransaction, TransactionId,
    TransactionRecord, TransactionType,
};

use super::r#trait::{LedgerStore, LedgerUow, LockedAccount};

const LOCK_ACCOUNT_SQL: &str = "SELECT id, balance FROM accounts WHERE id = $1 FOR UPDATE";

const INCREASE_BALANCE_SQL: &str = "UPDATE accounts SET balance = balance + $1 WHERE id = $2";
const DECREASE_BALANCE_SQL: &str = "UPDATE accounts SET balance = balance - $1 WHERE id = $2";

const INSERT_TRANSACTION_SQL: &str = r#"
    INSERT INTO transactions (source_account_id, destination_account_id, transaction_type, amount)
    VALUES ($1, $2, $3, $4)
"#;

const FETCH_OUTGOING_SQL: &str = r#"
    SELECT id, source_account_id, destination_account_id, transaction_type, amount, execution_time
    FROM transactions
    WHERE source_account_id = $1
        AND ($2::timestamptz IS NULL OR execution_time >= $2)
        AND ($3::timestamptz IS NULL OR execution_time <= $3)
"#;

const FETCH_INCOMING_SQL: &str = r#"
    SELECT id, source_account_id, destination_account_id, transaction_type, amount, execution_time
    FROM transactions
    WHERE destination_account_id = $1
        AND ($2::timestamptz IS NULL OR execution_time >= $2)
        AND ($3::timestamptz IS NULL OR execution_time <= $3)
"#;

/// Postgres implementation of [`LedgerStore`].
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Create a store over an injected connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    type Uow = PostgresUow;

    async fn begin(&self) -> LedgerResult<PostgresUow> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(PostgresUow { tx })
    }

    async fn begin_snapshot(&self) -> LedgerResult<PostgresUow> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_snapshot", e))?;
        // READ COMMITTED takes a snapshot per statement, which would permit
        // a torn read across the two directional fetches.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation_level", e))?;
        Ok(PostgresUow { tx })
    }

    #[instrument(skip(self, name, surname), err)]
    async fn create_account(&self, name: &str, surname: &str) -> LedgerResult<AccountId> {
        let row = sqlx::query(
            "INSERT INTO accounts (balance, name, surname) VALUES (0, $1, $2) RETURNING id",
        )
        .bind(name)
        .bind(surname)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_account", e))?;

        let id: i64 = row
            .try_get("id")
            .map_err(|e| LedgerError::technical(format!("failed to read generated id: {e}")))?;
        Ok(AccountId::new(id))
    }

    async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        let rows = sqlx::query("SELECT id, balance, name, surname FROM accounts ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_accounts", e))?;

        rows.iter().map(account_from_row).collect()
    }
}

/// Unit of work backed by a sqlx transaction.
///
/// Dropping it without committing rolls back (sqlx transaction-drop
/// semantics), so an abandoned operation never leaves partial writes.
pub struct PostgresUow {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerUow for PostgresUow {
    async fn lock_account(&mut self, id: AccountId) -> LedgerResult<Option<LockedAccount>> {
        let row = sqlx::query(LOCK_ACCOUNT_SQL)
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_account", e))?;

        match row {
            Some(row) => {
                let id: i64 = row
                    .try_get("id")
                    .map_err(|e| LedgerError::technical(format!("failed to read id: {e}")))?;
                let balance: Decimal = row
                    .try_get("balance")
                    .map_err(|e| LedgerError::technical(format!("failed to read balance: {e}")))?;
                Ok(Some(LockedAccount {
                    id: AccountId::new(id),
                    balance,
                }))
            }
            None => Ok(None),
        }
    }

    async fn increase_balance(&mut self, id: AccountId, amount: Decimal) -> LedgerResult<()> {
        sqlx::query(INCREASE_BALANCE_SQL)
            .bind(amount)
            .bind(id.as_i64())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("increase_balance", e))?;
        Ok(())
    }

    async fn decrease_balance(&mut self, id: AccountId, amount: Decimal) -> LedgerResult<()> {
        sqlx::query(DECREASE_BALANCE_SQL)
            .bind(amount)
            .bind(id.as_i64())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("decrease_balance", e))?;
        Ok(())
    }

    async fn insert_record(&mut self, record: &NewTransaction) -> LedgerResult<()> {
        sqlx::query(INSERT_TRANSACTION_SQL)
            .bind(record.source_account_id.map(|id| id.as_i64()))
            .bind(record.destination_account_id.as_i64())
            .bind(record.transaction_type.as_str())
            .bind(record.amount)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_record", e))?;
        Ok(())
    }

    async fn outgoing(
        &mut self,
        account: AccountId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> LedgerResult<Vec<TransactionRecord>> {
        self.fetch_directional(FETCH_OUTGOING_SQL, "fetch_outgoing", account, from, to)
            .await
    }

    async fn incoming(
        &mut self,
        account: AccountId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> LedgerResult<Vec<TransactionRecord>> {
        self.fetch_directional(FETCH_INCOMING_SQL, "fetch_incoming", account, from, to)
            .await
    }

    async fn commit(self) -> LedgerResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self) -> LedgerResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

impl PostgresUow {
    async fn fetch_directional(
        &mut self,
        sql: &str,
        operation: &str,
        account: AccountId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> LedgerResult<Vec<TransactionRecord>> {
        let rows = sqlx::query(sql)
            .bind(account.as_i64())
            .bind(from)
            .bind(to)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        rows.iter().map(record_from_row).collect()
    }
}

fn account_from_row(row: &PgRow) -> LedgerResult<Account> {
    Ok(Account {
        id: AccountId::new(read_column(row, "id")?),
        balance: read_column(row, "balance")?,
        name: read_column(row, "name")?,
        surname: read_column(row, "surname")?,
    })
}

fn record_from_row(row: &PgRow) -> LedgerResult<TransactionRecord> {
    let source: Option<i64> = read_column(row, "source_account_id")?;
    let transaction_type: String = read_column(row, "transaction_type")?;
    let transaction_type = TransactionType::parse(&transaction_type).ok_or_else(|| {
        LedgerError::technical(format!("unrecognized stored transaction type: {transaction_type}"))
    })?;

    Ok(TransactionRecord {
        id: TransactionId::new(read_column(row, "id")?),
        source_account_id: source.map(AccountId::new),
        destination_account_id: AccountId::new(read_column(row, "destination_account_id")?),
        amount: read_column(row, "amount")?,
        transaction_type,
        execution_time: read_column(row, "execution_time")?,
    })
}

fn read_column<'r, T>(row: &'r PgRow, column: &str) -> LedgerResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| LedgerError::technical(format!("failed to read column {column}: {e}")))
}

/// Map a sqlx error to the generic `Technical` business error, logging the
/// full detail internally. The external message never carries it.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    tracing::error!(operation, error = %err, "ledger store failure");
    LedgerError::technical(format!("{operation}: {err}"))
}
