//! Journal mutations and balance reads.
//!
//! Every mutation validates first, persists atomically, then schedules
//! rebuilds for the touched accounts from the earliest affected date.
//! Balance reads serve the running-balance cache and fall back to a cold
//! fold when the cache has not caught up; they never wait on the queue.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use tally_core::{
    Journal, JournalLegDraft, LedgerError, TransactionLeg, validate_legs,
};
use tally_shared::types::{AccountId, JournalId};
use tally_store::{LedgerStore, NewLeg};

use crate::queue::RebuildQueue;
use crate::rebuilder::cold_balance;

/// Input for creating or updating a journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJournalInput {
    /// Human-readable description.
    pub description: String,
    /// Date of the economic event; legs without their own date inherit it.
    pub journal_date: DateTime<Utc>,
    /// Journal currency all legs are normalized against.
    pub currency: String,
    /// The proposed legs.
    pub legs: Vec<JournalLegDraft>,
}

/// An account balance as served to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountBalanceView {
    /// The balance, from cache when available.
    pub balance: Decimal,
    /// Number of active legs contributing to the balance.
    pub transaction_count: usize,
}

/// Journal create/update/delete and balance reads.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    queue: RebuildQueue,
}

impl LedgerService {
    /// Creates the service over a store and rebuild queue.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, queue: RebuildQueue) -> Self {
        Self { store, queue }
    }

    /// Validates and persists a new journal, then schedules rebuilds for
    /// every touched account.
    ///
    /// # Errors
    ///
    /// Validation errors surface before any write. `UnknownCurrency` when
    /// the journal currency has no precision entry, `AccountNotFound` when
    /// a leg references a missing or deleted account.
    pub async fn create_journal(
        &self,
        input: CreateJournalInput,
    ) -> Result<(Journal, Vec<TransactionLeg>), LedgerError> {
        let precision = self.precision_for(&input.currency).await?;
        validate_legs(&input.legs, precision)?;
        self.verify_accounts_exist(&input.legs).await?;

        let journal = Journal::new(&input.description, input.journal_date, &input.currency);
        let new_legs = Self::to_new_legs(input.legs, input.journal_date)?;

        let (journal, legs) = self.store.create_journal(journal, new_legs).await?;
        info!(journal_id = %journal.id, legs = legs.len(), "journal created");

        self.schedule_rebuilds(&legs).await;
        Ok((journal, legs))
    }

    /// Validates replacement legs and atomically swaps a journal's legs,
    /// then schedules rebuilds across the union of old and new accounts
    /// from the earliest affected date.
    ///
    /// # Errors
    ///
    /// `JournalNotFound` when the journal is missing or deleted; the same
    /// validation errors as [`LedgerService::create_journal`].
    pub async fn update_journal(
        &self,
        journal_id: JournalId,
        input: CreateJournalInput,
    ) -> Result<(Journal, Vec<TransactionLeg>), LedgerError> {
        let existing = self
            .store
            .journal(journal_id)
            .await?
            .filter(|j| j.deleted_at.is_none())
            .ok_or(LedgerError::JournalNotFound(journal_id))?;

        let precision = self.precision_for(&input.currency).await?;
        validate_legs(&input.legs, precision)?;
        self.verify_accounts_exist(&input.legs).await?;

        let journal = Journal {
            description: input.description,
            journal_date: input.journal_date,
            currency: input.currency,
            ..existing
        };
        let new_legs = Self::to_new_legs(input.legs, journal.journal_date)?;

        let replaced = self.store.replace_journal_legs(journal.clone(), new_legs).await?;
        info!(
            journal_id = %journal.id,
            old_legs = replaced.old.len(),
            new_legs = replaced.new.len(),
            "journal updated"
        );

        // the old legs' accounts need their chains redone even if the new
        // legs no longer touch them
        let affected: Vec<&TransactionLeg> =
            replaced.old.iter().chain(replaced.new.iter()).collect();
        self.schedule_rebuilds(affected).await;
        Ok((journal, replaced.new))
    }

    /// Soft-deletes a journal and schedules rebuilds for its accounts.
    ///
    /// # Errors
    ///
    /// `JournalNotFound` when the journal is missing or already deleted.
    pub async fn delete_journal(&self, journal_id: JournalId) -> Result<(), LedgerError> {
        let legs = self.store.soft_delete_journal(journal_id).await?;
        info!(journal_id = %journal_id, legs = legs.len(), "journal deleted");
        self.schedule_rebuilds(&legs).await;
        Ok(())
    }

    /// Returns an account's balance, preferring the running-balance cache.
    ///
    /// With `as_of`, only legs dated at or before the cutoff contribute.
    /// When the cache tail is unset (a rebuild has not caught up yet) the
    /// balance is folded cold from the same legs; the read never waits on
    /// the rebuild queue.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` when the account does not exist.
    pub async fn get_account_balance(
        &self,
        account_id: AccountId,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<AccountBalanceView, LedgerError> {
        let account = self
            .store
            .account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;

        let legs = self.store.active_legs_for_account(account_id).await?;
        let visible: Vec<&TransactionLeg> = legs
            .iter()
            .filter(|l| as_of.is_none_or(|t| l.transaction_date <= t))
            .collect();

        let balance = match visible.last().map(|l| l.running_balance) {
            Some(Some(cached)) => cached,
            Some(None) => cold_balance(
                visible.iter().copied(),
                account.account_type,
                account.precision,
            ),
            None => Decimal::ZERO,
        };

        Ok(AccountBalanceView {
            balance,
            transaction_count: visible.len(),
        })
    }

    async fn precision_for(&self, currency: &str) -> Result<u32, LedgerError> {
        self.store
            .currency(currency)
            .await?
            .map(|c| c.precision)
            .ok_or_else(|| LedgerError::UnknownCurrency(currency.to_string()))
    }

    async fn verify_accounts_exist(&self, legs: &[JournalLegDraft]) -> Result<(), LedgerError> {
        for account_id in legs.iter().filter_map(|l| l.account_id) {
            let exists = self
                .store
                .account(account_id)
                .await?
                .is_some_and(|a| a.is_active());
            if !exists {
                return Err(LedgerError::AccountNotFound(account_id));
            }
        }
        Ok(())
    }

    fn to_new_legs(
        legs: Vec<JournalLegDraft>,
        journal_date: DateTime<Utc>,
    ) -> Result<Vec<NewLeg>, LedgerError> {
        legs.into_iter()
            .map(|draft| {
                Ok(NewLeg {
                    account_id: draft.account_id.ok_or(LedgerError::MissingLegAccount)?,
                    amount: draft.amount,
                    direction: draft.direction,
                    currency: draft.currency,
                    exchange_rate: draft.exchange_rate,
                    transaction_date: draft.transaction_date.unwrap_or(journal_date),
                })
            })
            .collect()
    }

    /// Enqueues a rebuild for every account the legs touch, from the
    /// earliest affected leg date.
    async fn schedule_rebuilds<'a>(&self, legs: impl IntoIterator<Item = &'a TransactionLeg>) {
        let mut accounts: HashSet<AccountId> = HashSet::new();
        let mut from_date: Option<DateTime<Utc>> = None;
        for leg in legs {
            accounts.insert(leg.account_id);
            if from_date.is_none_or(|d| leg.transaction_date < d) {
                from_date = Some(leg.transaction_date);
            }
        }
        if let Some(from_date) = from_date {
            self.queue.enqueue_many(accounts, from_date).await;
        }
    }
}
