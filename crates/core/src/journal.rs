//! Journals: atomic groups of legs representing one balanced economic event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_shared::types::JournalId;

/// Journal lifecycle status.
///
/// Only `Posted` journals contribute to balances; `Draft` and `Void`
/// journals are excluded by the active-legs view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalStatus {
    /// Journal is being drafted and can be modified.
    Draft,
    /// Journal has been posted to the ledger.
    Posted,
    /// Journal has been voided.
    Void,
}

impl JournalStatus {
    /// Returns true if legs of a journal in this status count toward balances.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Posted)
    }
}

/// An atomic group of legs representing one balanced economic event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    /// Unique identifier.
    pub id: JournalId,
    /// Human-readable description.
    pub description: String,
    /// Date of the economic event.
    pub journal_date: DateTime<Utc>,
    /// ISO 4217 currency code all legs are normalized against.
    pub currency: String,
    /// Lifecycle status.
    pub status: JournalStatus,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Journal {
    /// Creates a new posted journal.
    #[must_use]
    pub fn new(
        description: impl Into<String>,
        journal_date: DateTime<Utc>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: JournalId::new(),
            description: description.into(),
            journal_date,
            currency: currency.into(),
            status: JournalStatus::Posted,
            deleted_at: None,
        }
    }

    /// Returns true if this journal's legs count toward balances.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.deleted_at.is_none() && self.status.is_active()
    }
}
