//! Running balance rebuilder.
//!
//! The sole writer of the running-balance cache. Recomputes cached
//! balances for one account's active legs in `(transaction_date,
//! sequence)` order, optionally from a given date forward.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use tally_core::{AccountType, LedgerError, TransactionLeg, round_amount};
use tally_shared::types::AccountId;
use tally_store::LedgerStore;

/// Result of one rebuild run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RebuildOutcome {
    /// Legs whose balance was recomputed.
    pub legs_seen: usize,
    /// Legs whose cached balance actually changed and was persisted.
    pub legs_updated: usize,
}

/// Cold fold of signed leg effects, rounded per step.
///
/// The same arithmetic the rebuilder persists, shared with the auditor's
/// cache-ignorant recomputation and the read path's cache-miss fallback.
pub(crate) fn cold_balance<'a>(
    legs: impl IntoIterator<Item = &'a TransactionLeg>,
    account_type: AccountType,
    precision: u32,
) -> Decimal {
    let mut balance = Decimal::ZERO;
    for leg in legs {
        balance = round_amount(balance + leg.signed_effect(account_type), precision);
    }
    balance
}

/// Recomputes cached running balances for one account.
#[derive(Clone)]
pub struct BalanceRebuilder {
    store: Arc<dyn LedgerStore>,
}

impl BalanceRebuilder {
    /// Creates a rebuilder over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Rebuilds the running-balance cache for `account_id`.
    ///
    /// With `from_date`, the fold is seeded from the cached balance of the
    /// last active leg strictly before that date; if that cache is unset
    /// the run widens to a full rebuild from zero rather than trusting a
    /// hole. Balances are persisted only when they differ from the stored
    /// cache, so rerunning on an unchanged ledger produces zero writes.
    ///
    /// # Errors
    ///
    /// `LedgerError::AccountNotFound` is fatal for the run; storage errors
    /// propagate. Either the whole affected range was updated or an error
    /// is reported - there is no silent partial success.
    pub async fn rebuild(
        &self,
        account_id: AccountId,
        from_date: Option<DateTime<Utc>>,
    ) -> Result<RebuildOutcome, LedgerError> {
        let account = self
            .store
            .account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;

        let legs = self.store.active_legs_for_account(account_id).await?;

        let (mut balance, start) = match from_date {
            Some(from) => {
                let idx = legs.partition_point(|l| l.transaction_date < from);
                match legs[..idx].last().map(|prev| prev.running_balance) {
                    Some(Some(seed)) => (seed, idx),
                    // cache hole before the window: widen to a full rebuild
                    Some(None) => (Decimal::ZERO, 0),
                    None => (Decimal::ZERO, 0),
                }
            }
            None => (Decimal::ZERO, 0),
        };

        let mut updated = 0usize;
        for leg in &legs[start..] {
            balance = round_amount(
                balance + leg.signed_effect(account.account_type),
                account.precision,
            );
            if leg.running_balance != Some(balance) {
                self.store.set_running_balance(leg.id, balance).await?;
                updated += 1;
            }
        }

        let outcome = RebuildOutcome {
            legs_seen: legs.len() - start,
            legs_updated: updated,
        };
        debug!(
            %account_id,
            legs_seen = outcome.legs_seen,
            legs_updated = outcome.legs_updated,
            "rebuild complete"
        );
        Ok(outcome)
    }
}
