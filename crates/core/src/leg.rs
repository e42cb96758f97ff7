//! Transaction legs: one side (debit or credit) of a journal entry.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, JournalId, LegId};

use crate::account::AccountType;
use crate::rules::multiplier;

/// Leg direction: either Debit or Credit.
///
/// The balance effect of a direction depends on the account type; see
/// [`crate::rules::multiplier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Debit entry.
    Debit,
    /// Credit entry.
    Credit,
}

/// One side of a journal entry, tied to one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLeg {
    /// Unique identifier.
    pub id: LegId,
    /// The journal this leg belongs to.
    pub journal_id: JournalId,
    /// The account this leg posts to.
    pub account_id: AccountId,
    /// Non-negative amount in the leg's currency.
    pub amount: Decimal,
    /// Whether this leg debits or credits the account.
    pub direction: Direction,
    /// ISO 4217 currency code of the amount.
    pub currency: String,
    /// Exchange rate from the leg currency to the journal currency.
    pub exchange_rate: Decimal,
    /// Date the underlying transaction occurred.
    pub transaction_date: DateTime<Utc>,
    /// Cached running balance of the account after this leg.
    ///
    /// Written exclusively by the balance rebuilder; `None` means the cache
    /// has not been computed yet for this leg.
    pub running_balance: Option<Decimal>,
    /// Store-assigned creation order, monotonically increasing.
    pub sequence: u64,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TransactionLeg {
    /// Returns true if the leg itself has not been soft-deleted.
    ///
    /// Whether the leg counts toward balances also depends on its journal;
    /// the store's active-legs view applies both filters.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// The ordering key used by every balance computation.
    #[must_use]
    pub const fn ordering_key(&self) -> (DateTime<Utc>, u64) {
        (self.transaction_date, self.sequence)
    }

    /// Signed effect of this leg on an account of the given type.
    #[must_use]
    pub fn signed_effect(&self, account_type: AccountType) -> Decimal {
        self.amount * multiplier(account_type, self.direction)
    }
}
