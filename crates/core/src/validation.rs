//! Journal validation: balance and distinct-account invariants.
//!
//! The validator never mutates state. Malformed legs (missing account,
//! negative amount, non-positive rate) count as failures and are never
//! silently dropped.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::AccountId;

use crate::error::LedgerError;
use crate::leg::Direction;

/// A proposed leg, before the journal exists.
///
/// The account is optional so a leg arriving without one is representable
/// and can be rejected explicitly instead of being dropped upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLegDraft {
    /// The account this leg would post to.
    pub account_id: Option<AccountId>,
    /// Non-negative amount in the leg's currency.
    pub amount: Decimal,
    /// Debit or credit.
    pub direction: Direction,
    /// Exchange rate from the leg currency to the journal currency.
    pub exchange_rate: Decimal,
    /// ISO 4217 currency code of the amount.
    pub currency: String,
    /// Date the underlying transaction occurred; legs without one inherit
    /// the journal date.
    pub transaction_date: Option<DateTime<Utc>>,
}

impl JournalLegDraft {
    /// A draft leg in the journal currency (rate 1).
    #[must_use]
    pub fn same_currency(
        account_id: AccountId,
        amount: Decimal,
        direction: Direction,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            account_id: Some(account_id),
            amount,
            direction,
            exchange_rate: Decimal::ONE,
            currency: currency.into(),
            transaction_date: None,
        }
    }

    /// Pins the leg to its own transaction date instead of the journal's.
    #[must_use]
    pub fn on_date(mut self, date: DateTime<Utc>) -> Self {
        self.transaction_date = Some(date);
        self
    }
}

/// Result of checking a proposed set of legs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceCheck {
    /// Whether the legs form a valid journal.
    pub is_valid: bool,
    /// Signed difference (debits - credits) in journal currency.
    pub imbalance: Decimal,
    /// Sum of debit amounts, rate-normalized to the journal currency.
    pub total_debits: Decimal,
    /// Sum of credit amounts, rate-normalized to the journal currency.
    pub total_credits: Decimal,
}

/// Tolerance for the balance invariant: `10^-(precision+1)`.
///
/// One order of magnitude below the currency's own resolution, so rounding
/// residue from rate normalization never passes as a real imbalance.
#[must_use]
pub fn balance_tolerance(precision: u32) -> Decimal {
    Decimal::new(1, precision + 1)
}

/// Checks the balance and distinct-account invariants over proposed legs.
///
/// Returns a report; use [`validate_legs`] to map failures to specific
/// errors.
#[must_use]
pub fn check_legs(legs: &[JournalLegDraft], precision: u32) -> BalanceCheck {
    let mut total_debits = Decimal::ZERO;
    let mut total_credits = Decimal::ZERO;
    let mut accounts: HashSet<AccountId> = HashSet::new();
    let mut well_formed = !legs.is_empty();

    for leg in legs {
        match leg.account_id {
            Some(id) => {
                accounts.insert(id);
            }
            None => well_formed = false,
        }
        if leg.amount < Decimal::ZERO || leg.exchange_rate <= Decimal::ZERO {
            well_formed = false;
        }

        let normalized = leg.amount * leg.exchange_rate;
        match leg.direction {
            Direction::Debit => total_debits += normalized,
            Direction::Credit => total_credits += normalized,
        }
    }

    let imbalance = total_debits - total_credits;
    let is_valid = well_formed
        && accounts.len() >= 2
        && imbalance.abs() <= balance_tolerance(precision);

    BalanceCheck {
        is_valid,
        imbalance,
        total_debits,
        total_credits,
    }
}

/// Validates proposed legs, returning the first violated invariant.
///
/// # Errors
///
/// Returns a validation variant of [`LedgerError`] when any leg is
/// malformed, fewer than 2 distinct accounts are touched, or the journal
/// does not balance within `10^-(precision+1)`.
pub fn validate_legs(
    legs: &[JournalLegDraft],
    precision: u32,
) -> Result<BalanceCheck, LedgerError> {
    if legs.is_empty() {
        return Err(LedgerError::NoLegs);
    }

    for leg in legs {
        if leg.account_id.is_none() {
            return Err(LedgerError::MissingLegAccount);
        }
        if leg.amount < Decimal::ZERO {
            return Err(LedgerError::NegativeAmount);
        }
        if leg.exchange_rate <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveRate);
        }
    }

    let distinct: HashSet<AccountId> = legs.iter().filter_map(|l| l.account_id).collect();
    if distinct.len() < 2 {
        return Err(LedgerError::InsufficientAccounts);
    }

    let check = check_legs(legs, precision);
    if !check.is_valid {
        return Err(LedgerError::UnbalancedJournal {
            debits: check.total_debits,
            credits: check.total_credits,
            imbalance: check.imbalance,
        });
    }

    Ok(check)
}
