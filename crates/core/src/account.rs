//! Account types and the chart of accounts entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_shared::types::AccountId;

/// Account type classification.
///
/// In double-entry bookkeeping the type determines the normal balance side:
/// - Asset/Expense accounts are debit-normal
/// - Liability/Equity/Income accounts are credit-normal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Things owned (cash, bank accounts, investments).
    Asset,
    /// Things owed (credit cards, loans).
    Liability,
    /// Net worth / opening balances.
    Equity,
    /// Money coming in (salary, interest).
    Income,
    /// Money going out (groceries, rent).
    Expense,
}

impl AccountType {
    /// Returns true if a debit increases this account's balance.
    #[must_use]
    pub const fn is_debit_normal(self) -> bool {
        matches!(self, Self::Asset | Self::Expense)
    }
}

/// A chart of accounts entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier.
    pub id: AccountId,
    /// Display name (e.g., "Cash").
    pub name: String,
    /// Account type, fixes the sign rules for this account's legs.
    pub account_type: AccountType,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Decimal places the account's currency rounds to.
    pub precision: u32,
    /// Optional parent account (hierarchy).
    pub parent_id: Option<AccountId>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Creates a new active account.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        account_type: AccountType,
        currency: impl Into<String>,
        precision: u32,
    ) -> Self {
        Self {
            id: AccountId::new(),
            name: name.into(),
            account_type,
            currency: currency.into(),
            precision,
            parent_id: None,
            deleted_at: None,
        }
    }

    /// Returns true if the account has not been soft-deleted.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}
