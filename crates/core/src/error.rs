//! Ledger error types.
//!
//! Validation failures surface synchronously before any write; not-found
//! errors are fatal for the operation that hit them; rate and storage
//! failures are transient and marked retryable. Cache/log mismatches are
//! never errors: they are structured discrepancy records handled by the
//! integrity auditor.

use rust_decimal::Decimal;
use thiserror::Error;
use tally_shared::types::{AccountId, JournalId};

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Journal must have legs.
    #[error("Journal must have at least one leg")]
    NoLegs,

    /// Journal must touch at least 2 distinct accounts.
    #[error("Journal must touch at least 2 distinct accounts")]
    InsufficientAccounts,

    /// A leg is missing its account reference.
    #[error("Leg is missing an account reference")]
    MissingLegAccount,

    /// Leg amount cannot be negative.
    #[error("Leg amount cannot be negative")]
    NegativeAmount,

    /// Exchange rate must be positive.
    #[error("Exchange rate must be positive")]
    NonPositiveRate,

    /// Journal debits and credits do not balance.
    #[error("Journal is not balanced. Debits: {debits}, Credits: {credits}")]
    UnbalancedJournal {
        /// Total debit amount in journal currency.
        debits: Decimal,
        /// Total credit amount in journal currency.
        credits: Decimal,
        /// Signed difference (debits - credits).
        imbalance: Decimal,
    },

    // ========== Not-found Errors ==========
    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Journal not found.
    #[error("Journal not found: {0}")]
    JournalNotFound(JournalId),

    /// Currency not found in the precision table.
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    // ========== Currency Errors ==========
    /// No exchange rate available for the pair.
    #[error("No exchange rate available for {from} to {to}")]
    NoExchangeRate {
        /// Source currency code.
        from: String,
        /// Target currency code.
        to: String,
    },

    /// Rate table could not be obtained for a base currency.
    #[error("Exchange rates unavailable for base {base}: {reason}")]
    RateUnavailable {
        /// Base currency code.
        base: String,
        /// Why the lookup failed.
        reason: String,
    },

    // ========== Infrastructure Errors ==========
    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Returns the error code for display and logging.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NoLegs => "NO_LEGS",
            Self::InsufficientAccounts => "INSUFFICIENT_ACCOUNTS",
            Self::MissingLegAccount => "MISSING_LEG_ACCOUNT",
            Self::NegativeAmount => "NEGATIVE_AMOUNT",
            Self::NonPositiveRate => "NON_POSITIVE_RATE",
            Self::UnbalancedJournal { .. } => "UNBALANCED_JOURNAL",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::JournalNotFound(_) => "JOURNAL_NOT_FOUND",
            Self::UnknownCurrency(_) => "UNKNOWN_CURRENCY",
            Self::NoExchangeRate { .. } => "NO_EXCHANGE_RATE",
            Self::RateUnavailable { .. } => "RATE_UNAVAILABLE",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Returns true if a retry may succeed without caller intervention.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateUnavailable { .. } | Self::Storage(_))
    }

    /// Returns true if this is a validation failure (surfaced before any write).
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::NoLegs
                | Self::InsufficientAccounts
                | Self::MissingLegAccount
                | Self::NegativeAmount
                | Self::NonPositiveRate
                | Self::UnbalancedJournal { .. }
        )
    }
}
