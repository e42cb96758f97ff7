//! Integrity auditor: cold recomputation, cache verification, repair,
//! and first-run seeding.
//!
//! The auditor never trusts the running-balance cache. It refolds every
//! active leg from scratch and compares against the cached chain tail,
//! delegating repairs to the rebuilder.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};

use tally_core::{Account, AccountType, LedgerError, default_currencies};
use tally_shared::types::AccountId;
use tally_store::LedgerStore;

use crate::rebuilder::{BalanceRebuilder, cold_balance};

/// Outcome of comparing an account's cache against a cold recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceVerification {
    /// The audited account.
    pub account_id: AccountId,
    /// The cached balance on the last active leg, if set.
    pub cached_balance: Option<Decimal>,
    /// The balance recomputed from raw transaction data.
    pub computed_balance: Decimal,
    /// True when cache and recomputation agree.
    pub matches: bool,
    /// `computed - cached` (computed itself when the cache is unset).
    pub discrepancy: Decimal,
}

/// Summary of the startup integrity sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StartupReport {
    /// Accounts audited.
    pub total_accounts: usize,
    /// Accounts whose cache disagreed with the cold recomputation.
    pub discrepancies_found: usize,
    /// Repairs started.
    pub repairs_attempted: usize,
    /// Repairs that completed.
    pub repairs_successful: usize,
    /// True if this run seeded a fresh ledger instead of auditing.
    pub seeded: bool,
}

/// Verifies and repairs the running-balance cache.
pub struct IntegrityAuditor {
    store: Arc<dyn LedgerStore>,
    rebuilder: BalanceRebuilder,
    base_currency: String,
}

impl IntegrityAuditor {
    /// Creates an auditor over the given store.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        rebuilder: BalanceRebuilder,
        base_currency: String,
    ) -> Self {
        Self {
            store,
            rebuilder,
            base_currency,
        }
    }

    /// Recomputes an account balance from raw legs, ignoring the cache.
    ///
    /// With `as_of`, only legs dated at or before the cutoff contribute.
    ///
    /// # Errors
    ///
    /// Fails if the account does not exist or the store errors.
    pub async fn compute_balance_from_transactions(
        &self,
        account_id: AccountId,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Decimal, LedgerError> {
        let account = self
            .store
            .account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        let legs = self.store.active_legs_for_account(account_id).await?;
        let cutoff = legs
            .iter()
            .filter(|l| as_of.is_none_or(|t| l.transaction_date <= t));
        Ok(cold_balance(cutoff, account.account_type, account.precision))
    }

    /// Compares an account's cached chain tail against a cold fold.
    ///
    /// With `as_of`, both sides only consider legs dated at or before the
    /// cutoff. An account with no visible legs verifies vacuously: computed
    /// is zero and there is no cache to disagree with.
    ///
    /// # Errors
    ///
    /// Fails if the account does not exist or the store errors.
    pub async fn verify_account_balance(
        &self,
        account_id: AccountId,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<BalanceVerification, LedgerError> {
        let account = self
            .store
            .account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        let all_legs = self.store.active_legs_for_account(account_id).await?;
        let legs: Vec<_> = all_legs
            .into_iter()
            .filter(|l| as_of.is_none_or(|t| l.transaction_date <= t))
            .collect();

        let computed = cold_balance(legs.iter(), account.account_type, account.precision);
        let cached = legs.last().and_then(|l| l.running_balance);

        let (matches, discrepancy) = match (legs.is_empty(), cached) {
            (true, _) => (true, Decimal::ZERO),
            (false, Some(c)) => (c == computed, computed - c),
            // legs exist but the chain tail was never cached
            (false, None) => (false, computed),
        };

        if !matches {
            warn!(
                %account_id,
                cached = ?cached,
                computed = %computed,
                "running balance cache disagrees with transaction data"
            );
        }

        Ok(BalanceVerification {
            account_id,
            cached_balance: cached,
            computed_balance: computed,
            matches,
            discrepancy,
        })
    }

    /// Verifies every non-deleted account.
    ///
    /// One account failing to verify does not stop the sweep; the failure
    /// is logged and the remaining accounts are still audited.
    ///
    /// # Errors
    ///
    /// Fails only if the account list itself cannot be loaded.
    pub async fn verify_all_account_balances(
        &self,
    ) -> Result<Vec<BalanceVerification>, LedgerError> {
        let accounts = self.store.accounts().await?;
        let mut results = Vec::with_capacity(accounts.len());
        for account in accounts {
            match self.verify_account_balance(account.id, None).await {
                Ok(verification) => results.push(verification),
                Err(err) => {
                    error!(account_id = %account.id, error = %err, "verification failed, skipping account");
                }
            }
        }
        Ok(results)
    }

    /// Repairs an account by rebuilding its whole balance chain.
    ///
    /// # Errors
    ///
    /// Propagates rebuild failures.
    pub async fn repair_account_balance(
        &self,
        account_id: AccountId,
    ) -> Result<BalanceVerification, LedgerError> {
        self.rebuilder.rebuild(account_id, None).await?;
        let verification = self.verify_account_balance(account_id, None).await?;
        info!(%account_id, balance = %verification.computed_balance, "account balance repaired");
        Ok(verification)
    }

    /// Runs the startup integrity check.
    ///
    /// On a fresh store this seeds the currency table and a default chart
    /// of accounts instead of auditing. Otherwise every account is
    /// verified and mismatches are repaired in place.
    ///
    /// # Errors
    ///
    /// Fails if seeding or the account sweep cannot run at all; individual
    /// repair failures are logged and counted, not propagated.
    pub async fn run_startup_check(&self) -> Result<StartupReport, LedgerError> {
        if self.store.is_empty().await? {
            self.seed_defaults().await?;
            return Ok(StartupReport {
                total_accounts: 0,
                discrepancies_found: 0,
                repairs_attempted: 0,
                repairs_successful: 0,
                seeded: true,
            });
        }

        let verifications = self.verify_all_account_balances().await?;
        let total_accounts = verifications.len();
        let mismatched: Vec<AccountId> = verifications
            .iter()
            .filter(|v| !v.matches)
            .map(|v| v.account_id)
            .collect();

        let mut repairs_successful = 0;
        for account_id in &mismatched {
            match self.repair_account_balance(*account_id).await {
                Ok(v) if v.matches => repairs_successful += 1,
                Ok(v) => {
                    error!(%account_id, discrepancy = %v.discrepancy, "repair left a discrepancy");
                }
                Err(err) => {
                    error!(%account_id, error = %err, "repair failed");
                }
            }
        }

        info!(
            total_accounts,
            discrepancies_found = mismatched.len(),
            repairs_successful,
            "startup integrity check complete"
        );
        Ok(StartupReport {
            total_accounts,
            discrepancies_found: mismatched.len(),
            repairs_attempted: mismatched.len(),
            repairs_successful,
            seeded: false,
        })
    }

    /// Seeds the currency table and a starter chart of accounts.
    async fn seed_defaults(&self) -> Result<(), LedgerError> {
        let currencies = default_currencies();
        let precision = currencies
            .iter()
            .find(|c| c.code == self.base_currency)
            .map_or(2, |c| c.precision);
        for currency in currencies {
            self.store.upsert_currency(currency).await?;
        }

        let chart = [
            ("Cash", AccountType::Asset),
            ("Checking", AccountType::Asset),
            ("Savings", AccountType::Asset),
            ("Credit Card", AccountType::Liability),
            ("Opening Balances", AccountType::Equity),
            ("Salary", AccountType::Income),
            ("Groceries", AccountType::Expense),
            ("Rent", AccountType::Expense),
            ("Utilities", AccountType::Expense),
        ];
        for (name, account_type) in chart {
            self.store
                .insert_account(Account::new(
                    name,
                    account_type,
                    self.base_currency.clone(),
                    precision,
                ))
                .await?;
        }

        info!(base_currency = %self.base_currency, "seeded default currencies and chart of accounts");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use tally_core::{Direction, Journal};
    use tally_store::{MemoryLedgerStore, NewLeg};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn auditor(store: &Arc<MemoryLedgerStore>) -> IntegrityAuditor {
        let as_store = Arc::clone(store) as Arc<dyn LedgerStore>;
        IntegrityAuditor::new(
            Arc::clone(&as_store),
            BalanceRebuilder::new(as_store),
            "USD".to_string(),
        )
    }

    async fn setup_with_postings() -> (Arc<MemoryLedgerStore>, Account, Account) {
        let store = Arc::new(MemoryLedgerStore::new());
        let cash = store
            .insert_account(Account::new("Cash", AccountType::Asset, "USD", 2))
            .await
            .unwrap();
        let equity = store
            .insert_account(Account::new("Equity", AccountType::Equity, "USD", 2))
            .await
            .unwrap();
        for (amount, direction, at) in [
            (dec!(1000), Direction::Debit, 1000),
            (dec!(300), Direction::Credit, 2000),
        ] {
            let other = match direction {
                Direction::Debit => Direction::Credit,
                Direction::Credit => Direction::Debit,
            };
            store
                .create_journal(
                    Journal::new("test", ts(at), "USD"),
                    vec![
                        NewLeg {
                            account_id: cash.id,
                            amount,
                            direction,
                            currency: "USD".to_string(),
                            exchange_rate: Decimal::ONE,
                            transaction_date: ts(at),
                        },
                        NewLeg {
                            account_id: equity.id,
                            amount,
                            direction: other,
                            currency: "USD".to_string(),
                            exchange_rate: Decimal::ONE,
                            transaction_date: ts(at),
                        },
                    ],
                )
                .await
                .unwrap();
        }
        (store, cash, equity)
    }

    #[tokio::test]
    async fn test_cold_computation_ignores_cache() {
        let (store, cash, _) = setup_with_postings().await;
        let auditor = auditor(&store);

        // cache never built, cold computation still correct
        let balance = auditor
            .compute_balance_from_transactions(cash.id, None)
            .await
            .unwrap();
        assert_eq!(balance, dec!(700));

        let as_of = auditor
            .compute_balance_from_transactions(cash.id, Some(ts(1500)))
            .await
            .unwrap();
        assert_eq!(as_of, dec!(1000));
    }

    #[tokio::test]
    async fn test_verify_detects_corruption_and_repair_fixes_it() {
        let (store, cash, _) = setup_with_postings().await;
        let auditor = auditor(&store);
        auditor.rebuilder.rebuild(cash.id, None).await.unwrap();

        let ok = auditor.verify_account_balance(cash.id, None).await.unwrap();
        assert!(ok.matches);
        assert_eq!(ok.cached_balance, Some(dec!(700)));

        // corrupt the cache tail directly
        let legs = store.active_legs_for_account(cash.id).await.unwrap();
        store
            .set_running_balance(legs[1].id, dec!(9999))
            .await
            .unwrap();

        let bad = auditor.verify_account_balance(cash.id, None).await.unwrap();
        assert!(!bad.matches);
        assert_eq!(bad.computed_balance, dec!(700));
        assert_eq!(bad.discrepancy, dec!(700) - dec!(9999));

        let repaired = auditor.repair_account_balance(cash.id).await.unwrap();
        assert!(repaired.matches);
        assert_eq!(repaired.computed_balance, dec!(700));
    }

    #[tokio::test]
    async fn test_unset_cache_with_legs_is_a_discrepancy() {
        let (store, cash, _) = setup_with_postings().await;
        let auditor = auditor(&store);
        let v = auditor.verify_account_balance(cash.id, None).await.unwrap();
        assert!(!v.matches);
        assert_eq!(v.cached_balance, None);
        assert_eq!(v.discrepancy, dec!(700));
    }

    #[tokio::test]
    async fn test_verify_with_cutoff_uses_visible_tail() {
        let (store, cash, _) = setup_with_postings().await;
        let auditor = auditor(&store);
        auditor.rebuilder.rebuild(cash.id, None).await.unwrap();

        // only the t=1000 leg is visible at the cutoff
        let v = auditor
            .verify_account_balance(cash.id, Some(ts(1500)))
            .await
            .unwrap();
        assert!(v.matches);
        assert_eq!(v.cached_balance, Some(dec!(1000)));
        assert_eq!(v.computed_balance, dec!(1000));
    }

    #[tokio::test]
    async fn test_empty_account_verifies_vacuously() {
        let store = Arc::new(MemoryLedgerStore::new());
        let cash = store
            .insert_account(Account::new("Cash", AccountType::Asset, "USD", 2))
            .await
            .unwrap();
        let auditor = auditor(&store);
        let v = auditor.verify_account_balance(cash.id, None).await.unwrap();
        assert!(v.matches);
        assert_eq!(v.computed_balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_startup_seeds_fresh_store() {
        let store = Arc::new(MemoryLedgerStore::new());
        let auditor = auditor(&store);
        let report = auditor.run_startup_check().await.unwrap();
        assert!(report.seeded);

        let accounts = store.accounts().await.unwrap();
        assert_eq!(accounts.len(), 9);
        assert!(accounts.iter().all(|a| a.currency == "USD" && a.precision == 2));
        assert!(accounts.iter().any(|a| a.name == "Opening Balances"));
        assert!(store.currency("JPY").await.unwrap().is_some());
        assert_eq!(store.currency("JPY").await.unwrap().unwrap().precision, 0);
    }

    #[tokio::test]
    async fn test_startup_repairs_existing_store() {
        let (store, cash, equity) = setup_with_postings().await;
        let auditor = auditor(&store);
        auditor.rebuilder.rebuild(cash.id, None).await.unwrap();
        auditor.rebuilder.rebuild(equity.id, None).await.unwrap();

        let legs = store.active_legs_for_account(cash.id).await.unwrap();
        store
            .set_running_balance(legs[1].id, dec!(-5))
            .await
            .unwrap();

        let report = auditor.run_startup_check().await.unwrap();
        assert!(!report.seeded);
        assert_eq!(report.total_accounts, 2);
        assert_eq!(report.discrepancies_found, 1);
        assert_eq!(report.repairs_successful, 1);

        let v = auditor.verify_account_balance(cash.id, None).await.unwrap();
        assert!(v.matches);
    }
}
