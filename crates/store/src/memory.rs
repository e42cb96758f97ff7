//! In-memory ledger store.
//!
//! The local-first deployment target: everything lives in one process.
//! A single `RwLock` over the inner maps gives every mutating operation
//! the atomicity the trait requires.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use tally_core::{Account, Currency, Journal, LedgerError, RateTable, TransactionLeg};
use tally_shared::types::{AccountId, JournalId, LegId};

use crate::store::{LedgerStore, NewLeg, ReplacedLegs};

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<AccountId, Account>,
    journals: HashMap<JournalId, Journal>,
    legs: HashMap<LegId, TransactionLeg>,
    currencies: HashMap<String, Currency>,
    rate_tables: HashMap<String, RateTable>,
    next_sequence: u64,
}

impl Inner {
    fn next_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    /// The one place the active predicate lives.
    fn is_leg_active(&self, leg: &TransactionLeg) -> bool {
        leg.is_active()
            && self
                .journals
                .get(&leg.journal_id)
                .is_some_and(Journal::is_active)
    }
}

/// In-memory [`LedgerStore`] implementation.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    inner: RwLock<Inner>,
}

impl MemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert_account(&self, account: Account) -> Result<Account, LedgerError> {
        let mut inner = self.inner.write().await;
        inner.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn account(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        let inner = self.inner.read().await;
        Ok(inner.accounts.get(&id).cloned())
    }

    async fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let inner = self.inner.read().await;
        let mut accounts: Vec<Account> = inner
            .accounts
            .values()
            .filter(|a| a.is_active())
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(accounts)
    }

    async fn soft_delete_account(&self, id: AccountId) -> Result<(), LedgerError> {
        let mut inner = self.inner.write().await;
        let account = inner
            .accounts
            .get_mut(&id)
            .ok_or(LedgerError::AccountNotFound(id))?;
        account.deleted_at = Some(Utc::now());
        Ok(())
    }

    async fn create_journal(
        &self,
        journal: Journal,
        legs: Vec<NewLeg>,
    ) -> Result<(Journal, Vec<TransactionLeg>), LedgerError> {
        let mut inner = self.inner.write().await;
        let journal_id = journal.id;
        let mut stored = Vec::with_capacity(legs.len());
        for new_leg in legs {
            let sequence = inner.next_sequence();
            let leg = new_leg.into_leg(journal_id, sequence);
            inner.legs.insert(leg.id, leg.clone());
            stored.push(leg);
        }
        inner.journals.insert(journal_id, journal.clone());
        Ok((journal, stored))
    }

    async fn journal(&self, id: JournalId) -> Result<Option<Journal>, LedgerError> {
        let inner = self.inner.read().await;
        Ok(inner.journals.get(&id).cloned())
    }

    async fn journal_legs(&self, id: JournalId) -> Result<Vec<TransactionLeg>, LedgerError> {
        let inner = self.inner.read().await;
        let mut legs: Vec<TransactionLeg> = inner
            .legs
            .values()
            .filter(|l| l.journal_id == id && l.is_active())
            .cloned()
            .collect();
        legs.sort_by_key(|l| l.sequence);
        Ok(legs)
    }

    async fn replace_journal_legs(
        &self,
        journal: Journal,
        new_legs: Vec<NewLeg>,
    ) -> Result<ReplacedLegs, LedgerError> {
        let mut inner = self.inner.write().await;
        if !inner.journals.contains_key(&journal.id) {
            return Err(LedgerError::JournalNotFound(journal.id));
        }

        let now = Utc::now();
        let mut old = Vec::new();
        for leg in inner.legs.values_mut() {
            if leg.journal_id == journal.id && leg.is_active() {
                leg.deleted_at = Some(now);
                old.push(leg.clone());
            }
        }
        old.sort_by_key(|l| l.sequence);

        let mut new = Vec::with_capacity(new_legs.len());
        for new_leg in new_legs {
            let sequence = inner.next_sequence();
            let leg = new_leg.into_leg(journal.id, sequence);
            inner.legs.insert(leg.id, leg.clone());
            new.push(leg);
        }
        inner.journals.insert(journal.id, journal);

        Ok(ReplacedLegs { old, new })
    }

    async fn soft_delete_journal(
        &self,
        id: JournalId,
    ) -> Result<Vec<TransactionLeg>, LedgerError> {
        let mut inner = self.inner.write().await;
        let journal = inner
            .journals
            .get_mut(&id)
            .filter(|j| j.deleted_at.is_none())
            .ok_or(LedgerError::JournalNotFound(id))?;
        let now = Utc::now();
        journal.deleted_at = Some(now);

        let mut affected = Vec::new();
        for leg in inner.legs.values_mut() {
            if leg.journal_id == id && leg.is_active() {
                leg.deleted_at = Some(now);
                affected.push(leg.clone());
            }
        }
        affected.sort_by_key(|l| l.sequence);
        Ok(affected)
    }

    async fn active_legs_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionLeg>, LedgerError> {
        let inner = self.inner.read().await;
        let mut legs: Vec<TransactionLeg> = inner
            .legs
            .values()
            .filter(|l| l.account_id == account_id && inner.is_leg_active(l))
            .cloned()
            .collect();
        legs.sort_by_key(TransactionLeg::ordering_key);
        Ok(legs)
    }

    async fn set_running_balance(
        &self,
        leg_id: LegId,
        balance: Decimal,
    ) -> Result<(), LedgerError> {
        let mut inner = self.inner.write().await;
        let leg = inner
            .legs
            .get_mut(&leg_id)
            .ok_or_else(|| LedgerError::Storage(format!("unknown leg {leg_id}")))?;
        leg.running_balance = Some(balance);
        Ok(())
    }

    async fn upsert_currency(&self, currency: Currency) -> Result<(), LedgerError> {
        let mut inner = self.inner.write().await;
        inner.currencies.insert(currency.code.clone(), currency);
        Ok(())
    }

    async fn currency(&self, code: &str) -> Result<Option<Currency>, LedgerError> {
        let inner = self.inner.read().await;
        Ok(inner.currencies.get(code).cloned())
    }

    async fn save_rate_table(&self, table: RateTable) -> Result<(), LedgerError> {
        let mut inner = self.inner.write().await;
        inner.rate_tables.insert(table.base.clone(), table);
        Ok(())
    }

    async fn load_rate_table(&self, base: &str) -> Result<Option<RateTable>, LedgerError> {
        let inner = self.inner.read().await;
        Ok(inner.rate_tables.get(base).cloned())
    }

    async fn is_empty(&self) -> Result<bool, LedgerError> {
        let inner = self.inner.read().await;
        Ok(inner.accounts.is_empty())
    }
}
