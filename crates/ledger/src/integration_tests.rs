//! Engine-level tests over the in-memory store.
//!
//! Cover the executor's balance arithmetic and failure modes, the history
//! service's merging and filtering, and the concurrency property: opposing
//! transfers over the same account pair terminate (no deadlock) and conserve
//! the total balance.

use std::time::Duration;

use chrono::Duration as ChronoDuration;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tally_core::{AccountId, LedgerError, TransactionType};

use crate::executor::TransactionExecutor;
use crate::history::HistoryQueryService;
use crate::store::{InMemoryLedgerStore, LedgerStore};

fn setup() -> (
    InMemoryLedgerStore,
    TransactionExecutor<InMemoryLedgerStore>,
    HistoryQueryService<InMemoryLedgerStore>,
) {
    let store = InMemoryLedgerStore::new();
    (
        store.clone(),
        TransactionExecutor::new(store.clone()),
        HistoryQueryService::new(store),
    )
}

async fn open_account(store: &InMemoryLedgerStore, name: &str) -> AccountId {
    store.create_account(name, "Tester").await.unwrap()
}

async fn balance_of(store: &InMemoryLedgerStore, id: AccountId) -> Decimal {
    store
        .list_accounts()
        .await
        .unwrap()
        .into_iter()
        .find(|a| a.id == id)
        .unwrap()
        .balance
}

#[tokio::test]
async fn deposit_credits_destination_and_appends_record() {
    let (store, executor, history) = setup();
    let a = open_account(&store, "Ada").await;

    executor.deposit(a, dec!(100)).await.unwrap();

    assert_eq!(balance_of(&store, a).await, dec!(100));
    let records = history.list_transactions(a, None, None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].transaction_type, TransactionType::Deposit);
    assert_eq!(records[0].amount, dec!(100));
    assert_eq!(records[0].source_account_id, None);
    assert_eq!(records[0].destination_account_id, a);
}

#[tokio::test]
async fn deposit_to_missing_account_fails() {
    let (_store, executor, _history) = setup();

    let err = executor
        .deposit(AccountId::new(999), dec!(10))
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::AccountNotFound);
}

#[tokio::test]
async fn withdraw_debits_destination() {
    let (store, executor, _history) = setup();
    let a = open_account(&store, "Ada").await;

    executor.deposit(a, dec!(100)).await.unwrap();
    executor.withdraw(a, dec!(30)).await.unwrap();

    assert_eq!(balance_of(&store, a).await, dec!(70));
}

#[tokio::test]
async fn withdraw_beyond_balance_leaves_state_untouched() {
    let (store, executor, history) = setup();
    let a = open_account(&store, "Ada").await;
    executor.deposit(a, dec!(50)).await.unwrap();

    let err = executor.withdraw(a, dec!(70)).await.unwrap_err();
    assert_eq!(err, LedgerError::InsufficientFunds);

    assert_eq!(balance_of(&store, a).await, dec!(50));
    let records = history.list_transactions(a, None, None).await.unwrap();
    assert_eq!(records.len(), 1, "failed withdraw must not append a record");
}

#[tokio::test]
async fn withdraw_from_missing_account_fails() {
    let (_store, executor, _history) = setup();

    let err = executor
        .withdraw(AccountId::new(42), dec!(1))
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::AccountNotFound);
}

#[tokio::test]
async fn transfer_moves_amount_and_conserves_total() {
    let (store, executor, history) = setup();
    let a = open_account(&store, "Ada").await;
    let b = open_account(&store, "Blaise").await;
    executor.deposit(a, dec!(100)).await.unwrap();

    executor.transfer(a, b, dec!(40)).await.unwrap();

    assert_eq!(balance_of(&store, a).await, dec!(60));
    assert_eq!(balance_of(&store, b).await, dec!(40));

    let records = history.list_transactions(b, None, None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].transaction_type, TransactionType::Transfer);
    assert_eq!(records[0].source_account_id, Some(a));
    assert_eq!(records[0].destination_account_id, b);
    assert_eq!(records[0].amount, dec!(40));
}

#[tokio::test]
async fn transfer_involving_missing_account_changes_nothing() {
    let (store, executor, _history) = setup();
    let a = open_account(&store, "Ada").await;
    executor.deposit(a, dec!(100)).await.unwrap();

    let missing = AccountId::new(999);
    assert_eq!(
        executor.transfer(a, missing, dec!(10)).await.unwrap_err(),
        LedgerError::AccountNotFound
    );
    assert_eq!(
        executor.transfer(missing, a, dec!(10)).await.unwrap_err(),
        LedgerError::AccountNotFound
    );

    assert_eq!(balance_of(&store, a).await, dec!(100));
}

#[tokio::test]
async fn transfer_with_insufficient_source_funds_fails() {
    let (store, executor, _history) = setup();
    let a = open_account(&store, "Ada").await;
    let b = open_account(&store, "Blaise").await;
    executor.deposit(a, dec!(20)).await.unwrap();

    let err = executor.transfer(a, b, dec!(25)).await.unwrap_err();
    assert_eq!(err, LedgerError::InsufficientFunds);

    assert_eq!(balance_of(&store, a).await, dec!(20));
    assert_eq!(balance_of(&store, b).await, Decimal::ZERO);
}

#[tokio::test]
async fn insufficient_funds_check_follows_the_source_id_not_the_lock_order() {
    let (store, executor, _history) = setup();
    // The source has the higher id, so it is locked second.
    let poor = open_account(&store, "Poor").await;
    let rich = open_account(&store, "Rich").await;
    executor.deposit(poor, dec!(5)).await.unwrap();
    executor.deposit(rich, dec!(500)).await.unwrap();

    let err = executor.transfer(rich, poor, dec!(600)).await.unwrap_err();
    assert_eq!(err, LedgerError::InsufficientFunds);

    executor.transfer(rich, poor, dec!(100)).await.unwrap();
    assert_eq!(balance_of(&store, rich).await, dec!(400));
    assert_eq!(balance_of(&store, poor).await, dec!(105));
}

#[tokio::test]
async fn undefined_inputs_are_refused_without_touching_state() {
    let (store, executor, _history) = setup();
    let a = open_account(&store, "Ada").await;
    executor.deposit(a, dec!(10)).await.unwrap();

    assert!(matches!(
        executor.deposit(a, dec!(0)).await.unwrap_err(),
        LedgerError::Technical(_)
    ));
    assert!(matches!(
        executor.withdraw(a, dec!(-5)).await.unwrap_err(),
        LedgerError::Technical(_)
    ));
    assert!(matches!(
        executor.transfer(a, a, dec!(5)).await.unwrap_err(),
        LedgerError::Technical(_)
    ));

    assert_eq!(balance_of(&store, a).await, dec!(10));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposing_transfers_terminate_and_conserve_balance() {
    let (store, executor, _history) = setup();
    let a = open_account(&store, "Ada").await;
    let b = open_account(&store, "Blaise").await;
    executor.deposit(a, dec!(1000)).await.unwrap();
    executor.deposit(b, dec!(1000)).await.unwrap();

    // Half the tasks push a->b, half b->a. With a broken acquisition order
    // the in-memory row mutexes deadlock and the timeout below trips.
    let mut handles = Vec::new();
    for i in 0..16 {
        let executor = executor.clone();
        handles.push(tokio::spawn(async move {
            let (source, destination) = if i % 2 == 0 { (a, b) } else { (b, a) };
            for _ in 0..10 {
                match executor.transfer(source, destination, dec!(3)).await {
                    Ok(()) | Err(LedgerError::InsufficientFunds) => {}
                    Err(other) => panic!("unexpected transfer failure: {other:?}"),
                }
            }
        }));
    }

    tokio::time::timeout(Duration::from_secs(30), async {
        for handle in handles {
            handle.await.unwrap();
        }
    })
    .await
    .expect("transfers deadlocked");

    let total = balance_of(&store, a).await + balance_of(&store, b).await;
    assert_eq!(total, dec!(2000));
    assert!(balance_of(&store, a).await >= Decimal::ZERO);
    assert!(balance_of(&store, b).await >= Decimal::ZERO);
}

#[tokio::test]
async fn history_merges_both_directions_in_execution_order() {
    let (store, executor, history) = setup();
    let a = open_account(&store, "Ada").await;
    let b = open_account(&store, "Blaise").await;

    executor.deposit(a, dec!(100)).await.unwrap();
    executor.deposit(a, dec!(100)).await.unwrap();
    executor.withdraw(a, dec!(70)).await.unwrap();
    executor.transfer(b, a, dec!(0.01)).await.unwrap_err(); // no funds, no record
    executor.deposit(b, dec!(10)).await.unwrap();
    executor.transfer(b, a, dec!(5)).await.unwrap();

    let records = history.list_transactions(a, None, None).await.unwrap();
    assert_eq!(records.len(), 4);
    assert!(
        records
            .windows(2)
            .all(|w| w[0].execution_time <= w[1].execution_time)
    );
    let types: Vec<_> = records.iter().map(|r| r.transaction_type).collect();
    assert_eq!(
        types,
        vec![
            TransactionType::Deposit,
            TransactionType::Deposit,
            TransactionType::Withdraw,
            TransactionType::Transfer,
        ]
    );

    // The transfer shows up for b as well, as its outgoing record.
    let records = history.list_transactions(b, None, None).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].transaction_type, TransactionType::Transfer);
    assert_eq!(records[1].source_account_id, Some(b));
}

#[tokio::test]
async fn history_window_bounds_are_inclusive() {
    let (store, executor, history) = setup();
    let a = open_account(&store, "Ada").await;

    for _ in 0..3 {
        executor.deposit(a, dec!(10)).await.unwrap();
    }
    let all = history.list_transactions(a, None, None).await.unwrap();
    let first = all.first().unwrap().execution_time;
    let last = all.last().unwrap().execution_time;

    let exact = history
        .list_transactions(a, Some(first), Some(last))
        .await
        .unwrap();
    assert_eq!(exact.len(), 3, "records at the bounds must be kept");

    let tail = history.list_transactions(a, Some(last), None).await.unwrap();
    assert!(tail.iter().any(|r| r.execution_time == last));
    assert!(tail.iter().all(|r| r.execution_time >= last));

    let head = history
        .list_transactions(a, None, Some(first))
        .await
        .unwrap();
    assert!(head.iter().any(|r| r.execution_time == first));
    assert!(head.iter().all(|r| r.execution_time <= first));
}

#[tokio::test]
async fn window_outside_all_records_is_empty() {
    let (store, executor, history) = setup();
    let a = open_account(&store, "Ada").await;
    executor.deposit(a, dec!(10)).await.unwrap();
    executor.deposit(a, dec!(20)).await.unwrap();

    let all = history.list_transactions(a, None, None).await.unwrap();
    let first = all.first().unwrap().execution_time;
    let last = all.last().unwrap().execution_time;

    let after = history
        .list_transactions(a, Some(last + ChronoDuration::seconds(1)), None)
        .await
        .unwrap();
    assert!(after.is_empty());

    let before = history
        .list_transactions(a, None, Some(first - ChronoDuration::seconds(1)))
        .await
        .unwrap();
    assert!(before.is_empty());
}

#[tokio::test]
async fn committed_records_round_trip_through_history() {
    let (store, executor, history) = setup();
    let a = open_account(&store, "Ada").await;
    let b = open_account(&store, "Blaise").await;
    executor.deposit(a, dec!(12.34)).await.unwrap();
    executor.transfer(a, b, dec!(0.34)).await.unwrap();

    let records = history.list_transactions(a, None, None).await.unwrap();
    assert_eq!(records.len(), 2);

    assert_eq!(records[0].source_account_id, None);
    assert_eq!(records[0].destination_account_id, a);
    assert_eq!(records[0].amount, dec!(12.34));
    assert_eq!(records[0].transaction_type, TransactionType::Deposit);

    assert_eq!(records[1].source_account_id, Some(a));
    assert_eq!(records[1].destination_account_id, b);
    assert_eq!(records[1].amount, dec!(0.34));
    assert_eq!(records[1].transaction_type, TransactionType::Transfer);
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    /// Property: an arbitrary deposit/withdraw sequence ends at the balance
    /// a plain integer model predicts, the balance never goes negative, and
    /// exactly the successful operations leave records.
    #[test]
    fn random_sequences_match_a_sequential_model(
        ops in prop::collection::vec((any::<bool>(), 1i64..500), 1..40)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let (store, executor, history) = setup();
            let a = open_account(&store, "Model").await;

            let mut model: i64 = 0;
            let mut committed: usize = 0;

            for (is_deposit, units) in ops {
                let amount = Decimal::from(units);
                if is_deposit {
                    executor.deposit(a, amount).await.unwrap();
                    model += units;
                    committed += 1;
                } else {
                    match executor.withdraw(a, amount).await {
                        Ok(()) => {
                            model -= units;
                            committed += 1;
                        }
                        Err(LedgerError::InsufficientFunds) => {
                            assert!(model < units);
                        }
                        Err(other) => panic!("unexpected failure: {other:?}"),
                    }
                }
                assert!(model >= 0, "model balance must never go negative");
            }

            assert_eq!(balance_of(&store, a).await, Decimal::from(model));
            let records = history.list_transactions(a, None, None).await.unwrap();
            assert_eq!(records.len(), committed);
        });
    }
}
