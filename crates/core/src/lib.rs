//! Core double-entry ledger logic for Tally.
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.
//!
//! - Accounts, journals and transaction legs (soft-deletable)
//! - Accounting sign rules per (account type, leg direction)
//! - Journal validation (balance and distinct-account invariants)
//! - Currency precision table and rounding

pub mod account;
pub mod currency;
pub mod error;
pub mod journal;
pub mod leg;
pub mod rules;
pub mod validation;

pub use account::{Account, AccountType};
pub use currency::{Currency, RateTable, default_currencies, round_amount};
pub use error::LedgerError;
pub use journal::{Journal, JournalStatus};
pub use leg::{Direction, TransactionLeg};
pub use rules::multiplier;
pub use validation::{BalanceCheck, JournalLegDraft, balance_tolerance, check_legs, validate_legs};
