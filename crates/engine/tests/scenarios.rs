//! End-to-end scenarios over the fully wired engine.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tally_core::{Account, Direction, JournalLegDraft, LedgerError, RateTable};
use tally_engine::{CreateJournalInput, Engine, RateProvider};
use tally_shared::AppConfig;
use tally_store::{LedgerStore, MemoryLedgerStore};

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

struct StaticProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl RateProvider for StaticProvider {
    async fn fetch_table(&self, base: &str) -> Result<RateTable, LedgerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut rates = HashMap::new();
        rates.insert("EUR".to_string(), dec!(0.9));
        rates.insert("JPY".to_string(), dec!(150));
        Ok(RateTable {
            base: base.to_string(),
            rates,
            fetched_at: Utc::now(),
        })
    }
}

async fn engine() -> (Engine, Arc<StaticProvider>) {
    let store = Arc::new(MemoryLedgerStore::new());
    let provider = Arc::new(StaticProvider {
        calls: AtomicUsize::new(0),
    });
    let engine = Engine::new(
        store as Arc<dyn LedgerStore>,
        Arc::clone(&provider) as Arc<dyn RateProvider>,
        &AppConfig::default(),
    );
    (engine, provider)
}

async fn account_named(engine: &Engine, name: &str) -> Account {
    engine
        .store
        .accounts()
        .await
        .unwrap()
        .into_iter()
        .find(|a| a.name == name)
        .unwrap()
}

fn transfer(
    from_credit: &Account,
    to_debit: &Account,
    amount: Decimal,
    at: i64,
    description: &str,
) -> CreateJournalInput {
    CreateJournalInput {
        description: description.to_string(),
        journal_date: ts(at),
        currency: "USD".to_string(),
        legs: vec![
            JournalLegDraft::same_currency(to_debit.id, amount, Direction::Debit, "USD"),
            JournalLegDraft::same_currency(from_credit.id, amount, Direction::Credit, "USD"),
        ],
    }
}

#[tokio::test]
async fn balances_settle_after_posting_and_spending() {
    let (engine, _) = engine().await;
    engine.auditor.run_startup_check().await.unwrap();
    let cash = account_named(&engine, "Cash").await;
    let opening = account_named(&engine, "Opening Balances").await;
    let groceries = account_named(&engine, "Groceries").await;

    engine
        .service
        .create_journal(transfer(&opening, &cash, dec!(1000), 1000, "Opening"))
        .await
        .unwrap();
    engine
        .service
        .create_journal(transfer(&cash, &groceries, dec!(300), 2000, "Food"))
        .await
        .unwrap();
    engine.queue.flush().await;

    let view = engine
        .service
        .get_account_balance(cash.id, None)
        .await
        .unwrap();
    assert_eq!(view.balance, dec!(700));
    assert_eq!(view.transaction_count, 2);

    let view = engine
        .service
        .get_account_balance(groceries.id, None)
        .await
        .unwrap();
    assert_eq!(view.balance, dec!(300));
}

#[tokio::test]
async fn backdated_journal_reflows_the_chain() {
    let (engine, _) = engine().await;
    engine.auditor.run_startup_check().await.unwrap();
    let cash = account_named(&engine, "Cash").await;
    let opening = account_named(&engine, "Opening Balances").await;
    let rent = account_named(&engine, "Rent").await;

    engine
        .service
        .create_journal(transfer(&opening, &cash, dec!(100), 1000, "T1"))
        .await
        .unwrap();
    engine
        .service
        .create_journal(transfer(&opening, &cash, dec!(200), 3000, "T3"))
        .await
        .unwrap();
    engine.queue.flush().await;

    // insert T2 between the existing entries
    engine
        .service
        .create_journal(transfer(&cash, &rent, dec!(50), 2000, "T2"))
        .await
        .unwrap();
    engine.queue.flush().await;

    let legs = engine.store.active_legs_for_account(cash.id).await.unwrap();
    let balances: Vec<Decimal> = legs.iter().map(|l| l.running_balance.unwrap()).collect();
    assert_eq!(balances, vec![dec!(100), dec!(50), dec!(250)]);

    // the full chain also passes audit
    let v = engine.auditor.verify_account_balance(cash.id, None).await.unwrap();
    assert!(v.matches);
}

#[tokio::test]
async fn corrupted_cache_is_detected_and_repaired() {
    let (engine, _) = engine().await;
    engine.auditor.run_startup_check().await.unwrap();
    let cash = account_named(&engine, "Cash").await;
    let opening = account_named(&engine, "Opening Balances").await;

    engine
        .service
        .create_journal(transfer(&opening, &cash, dec!(1000), 1000, "Opening"))
        .await
        .unwrap();
    engine.queue.flush().await;

    let legs = engine.store.active_legs_for_account(cash.id).await.unwrap();
    engine
        .store
        .set_running_balance(legs[0].id, dec!(123.45))
        .await
        .unwrap();

    let v = engine.auditor.verify_account_balance(cash.id, None).await.unwrap();
    assert!(!v.matches);
    assert_eq!(v.computed_balance, dec!(1000));
    assert_eq!(v.cached_balance, Some(dec!(123.45)));

    let repaired = engine.auditor.repair_account_balance(cash.id).await.unwrap();
    assert!(repaired.matches);
    assert_eq!(repaired.computed_balance, dec!(1000));
}

#[tokio::test]
async fn startup_on_fresh_store_seeds_then_subsequent_runs_audit() {
    let (engine, _) = engine().await;

    let first = engine.auditor.run_startup_check().await.unwrap();
    assert!(first.seeded);
    assert!(engine.store.currency("USD").await.unwrap().is_some());
    assert_eq!(engine.store.accounts().await.unwrap().len(), 9);

    let second = engine.auditor.run_startup_check().await.unwrap();
    assert!(!second.seeded);
    assert_eq!(second.total_accounts, 9);
    assert_eq!(second.discrepancies_found, 0);
}

#[tokio::test]
async fn burst_of_edits_coalesces_per_account() {
    let (engine, _) = engine().await;
    engine.auditor.run_startup_check().await.unwrap();
    let cash = account_named(&engine, "Cash").await;
    let opening = account_named(&engine, "Opening Balances").await;

    for i in 0..10i64 {
        engine
            .service
            .create_journal(transfer(
                &opening,
                &cash,
                dec!(10),
                1000 + i * 100,
                "burst",
            ))
            .await
            .unwrap();
    }
    // the pending window for the account merged to the earliest edit
    assert_eq!(engine.queue.pending_window(cash.id).await, Some(ts(1000)));

    engine.queue.flush().await;
    let view = engine
        .service
        .get_account_balance(cash.id, None)
        .await
        .unwrap();
    assert_eq!(view.balance, dec!(100));
    assert_eq!(view.transaction_count, 10);
}

#[tokio::test]
async fn updating_a_journal_amount_reflows_downstream_balances() {
    let (engine, _) = engine().await;
    engine.auditor.run_startup_check().await.unwrap();
    let cash = account_named(&engine, "Cash").await;
    let opening = account_named(&engine, "Opening Balances").await;

    let (journal, _) = engine
        .service
        .create_journal(transfer(&opening, &cash, dec!(100), 1000, "T1"))
        .await
        .unwrap();
    engine
        .service
        .create_journal(transfer(&opening, &cash, dec!(200), 2000, "T2"))
        .await
        .unwrap();
    engine.queue.flush().await;

    engine
        .service
        .update_journal(journal.id, transfer(&opening, &cash, dec!(500), 1000, "T1 fixed"))
        .await
        .unwrap();
    engine.queue.flush().await;

    let legs = engine.store.active_legs_for_account(cash.id).await.unwrap();
    let balances: Vec<Decimal> = legs.iter().map(|l| l.running_balance.unwrap()).collect();
    assert_eq!(balances, vec![dec!(500), dec!(700)]);
}

#[tokio::test]
async fn conversion_rides_the_shared_rate_table() {
    let (engine, provider) = engine().await;

    let (eur, jpy) = tokio::join!(
        engine.rates.convert(dec!(100), "USD", "EUR", 2),
        engine.rates.convert(dec!(100), "USD", "JPY", 0),
    );
    assert_eq!(eur.unwrap(), dec!(90.00));
    assert_eq!(jpy.unwrap(), dec!(15000));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    // the fetched table was persisted for the stale-fallback tier
    assert!(engine.store.load_rate_table("USD").await.unwrap().is_some());
}
