//! Accounting sign rules.

use rust_decimal::Decimal;

use crate::account::AccountType;
use crate::leg::Direction;

/// Sign multiplier for a leg's effect on its account balance.
///
/// Asset/Expense: Debit = +1, Credit = -1.
/// Liability/Equity/Income: Credit = +1, Debit = -1.
///
/// Pure and total over the enum domain; no failure modes.
#[must_use]
pub fn multiplier(account_type: AccountType, direction: Direction) -> Decimal {
    let increases = match direction {
        Direction::Debit => account_type.is_debit_normal(),
        Direction::Credit => !account_type.is_debit_normal(),
    };
    if increases { Decimal::ONE } else { Decimal::NEGATIVE_ONE }
}
