//! Currencies, the precision seed table, and rounding.
//!
//! CRITICAL: Rounding strategy for money:
//! - Always round to the currency's decimal places
//! - Use banker's rounding (round half to even)

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A currency with its display symbol and rounding precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// ISO 4217 code.
    pub code: String,
    /// Decimal places amounts round to for equality/balance comparisons.
    pub precision: u32,
    /// Display symbol.
    pub symbol: String,
}

impl Currency {
    /// Creates a new currency.
    #[must_use]
    pub fn new(code: impl Into<String>, precision: u32, symbol: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            precision,
            symbol: symbol.into(),
        }
    }
}

/// The currency precision table seeded on first run.
///
/// Zero-decimal and three-decimal currencies are listed explicitly;
/// everything else uses 2 decimal places.
#[must_use]
pub fn default_currencies() -> Vec<Currency> {
    vec![
        Currency::new("USD", 2, "$"),
        Currency::new("EUR", 2, "\u{20ac}"),
        Currency::new("GBP", 2, "\u{a3}"),
        Currency::new("CAD", 2, "$"),
        Currency::new("AUD", 2, "$"),
        Currency::new("CHF", 2, "Fr"),
        Currency::new("CNY", 2, "\u{a5}"),
        Currency::new("INR", 2, "\u{20b9}"),
        Currency::new("JPY", 0, "\u{a5}"),
        Currency::new("KRW", 0, "\u{20a9}"),
        Currency::new("KWD", 3, "KD"),
        Currency::new("BHD", 3, "BD"),
    ]
}

/// Rounds a monetary value to the given precision using banker's rounding.
#[must_use]
pub fn round_amount(value: Decimal, precision: u32) -> Decimal {
    value.round_dp_with_strategy(precision, RoundingStrategy::MidpointNearestEven)
}

/// A full exchange-rate table for one base currency.
///
/// The unit of persistence for the rate fallback tier: the most recently
/// fetched table per base is kept so remote outages degrade to stale rates
/// instead of hard failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    /// Base currency code.
    pub base: String,
    /// Rate per target currency code (1 base = rate target).
    pub rates: HashMap<String, Decimal>,
    /// When the table was fetched from the remote source.
    pub fetched_at: DateTime<Utc>,
}

impl RateTable {
    /// Looks up the rate from the base to `to`.
    #[must_use]
    pub fn rate_to(&self, to: &str) -> Option<Decimal> {
        if to == self.base {
            return Some(Decimal::ONE);
        }
        self.rates.get(to).copied()
    }

    /// Returns true if the table was fetched within `ttl_secs` of `now`.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl_secs: u64) -> bool {
        let age = now.signed_duration_since(self.fetched_at);
        age.num_seconds() >= 0 && age.num_seconds() as u64 <= ttl_secs
    }
}
