//! The `LedgerStore` trait: atomic create/update/delete/query over
//! accounts, journals and legs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_core::{Account, Currency, Direction, Journal, LedgerError, RateTable, TransactionLeg};
use tally_shared::types::{AccountId, JournalId, LegId};

/// Leg data ready to persist, after validation.
///
/// The store assigns the id, creation sequence, and leaves the running
/// balance unset; the rebuilder fills it in later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLeg {
    /// The account this leg posts to.
    pub account_id: AccountId,
    /// Non-negative amount in the leg's currency.
    pub amount: Decimal,
    /// Debit or credit.
    pub direction: Direction,
    /// ISO 4217 currency code of the amount.
    pub currency: String,
    /// Exchange rate from the leg currency to the journal currency.
    pub exchange_rate: Decimal,
    /// Date the underlying transaction occurred.
    pub transaction_date: DateTime<Utc>,
}

/// Result of atomically replacing a journal's legs.
#[derive(Debug, Clone)]
pub struct ReplacedLegs {
    /// The legs that were soft-deleted.
    pub old: Vec<TransactionLeg>,
    /// The replacement legs as persisted.
    pub new: Vec<TransactionLeg>,
}

/// Atomic persistence boundary for the ledger.
///
/// Implementations must apply each mutating operation atomically: a journal
/// and its legs are visible together or not at all, and a replace never
/// exposes a half-swapped state. The active-legs view is the single place
/// the "not soft-deleted AND journal status active" filter is applied.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ========== Accounts ==========

    /// Persists a new account.
    async fn insert_account(&self, account: Account) -> Result<Account, LedgerError>;

    /// Looks up an account by id (soft-deleted accounts included).
    async fn account(&self, id: AccountId) -> Result<Option<Account>, LedgerError>;

    /// All non-deleted accounts.
    async fn accounts(&self) -> Result<Vec<Account>, LedgerError>;

    /// Soft-deletes an account.
    async fn soft_delete_account(&self, id: AccountId) -> Result<(), LedgerError>;

    // ========== Journals & legs ==========

    /// Atomically persists a journal and its legs.
    ///
    /// Running balances are left unset. Returns the persisted legs with
    /// store-assigned ids and sequences.
    async fn create_journal(
        &self,
        journal: Journal,
        legs: Vec<NewLeg>,
    ) -> Result<(Journal, Vec<TransactionLeg>), LedgerError>;

    /// Looks up a journal by id.
    async fn journal(&self, id: JournalId) -> Result<Option<Journal>, LedgerError>;

    /// Non-deleted legs of a journal, in creation order.
    async fn journal_legs(&self, id: JournalId) -> Result<Vec<TransactionLeg>, LedgerError>;

    /// Atomically soft-deletes a journal's current legs and persists
    /// replacements, updating the journal row itself.
    async fn replace_journal_legs(
        &self,
        journal: Journal,
        new_legs: Vec<NewLeg>,
    ) -> Result<ReplacedLegs, LedgerError>;

    /// Soft-deletes a journal and its legs, returning the affected legs.
    ///
    /// A journal that is missing or already soft-deleted is
    /// `JournalNotFound`.
    async fn soft_delete_journal(&self, id: JournalId)
    -> Result<Vec<TransactionLeg>, LedgerError>;

    // ========== Views ==========

    /// Active legs for an account, ordered by `(transaction_date, sequence)`.
    ///
    /// "Active" means: leg not soft-deleted, journal not soft-deleted, and
    /// journal status in the active set. Every balance computation reads
    /// through this view.
    async fn active_legs_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionLeg>, LedgerError>;

    // ========== Running balance cache ==========

    /// Writes a leg's cached running balance.
    ///
    /// The balance rebuilder is the only production caller.
    async fn set_running_balance(
        &self,
        leg_id: LegId,
        balance: Decimal,
    ) -> Result<(), LedgerError>;

    // ========== Currencies ==========

    /// Inserts or replaces a currency.
    async fn upsert_currency(&self, currency: Currency) -> Result<(), LedgerError>;

    /// Looks up a currency by code.
    async fn currency(&self, code: &str) -> Result<Option<Currency>, LedgerError>;

    // ========== Exchange rate tables ==========

    /// Persists the most recent rate table for its base currency.
    async fn save_rate_table(&self, table: RateTable) -> Result<(), LedgerError>;

    /// Loads the most recently persisted rate table for a base currency.
    async fn load_rate_table(&self, base: &str) -> Result<Option<RateTable>, LedgerError>;

    // ========== Lifecycle ==========

    /// True if no accounts have ever been created (first run).
    async fn is_empty(&self) -> Result<bool, LedgerError>;
}

impl NewLeg {
    /// Materializes this leg into a stored record.
    #[must_use]
    pub fn into_leg(self, journal_id: JournalId, sequence: u64) -> TransactionLeg {
        TransactionLeg {
            id: LegId::new(),
            journal_id,
            account_id: self.account_id,
            amount: self.amount,
            direction: self.direction,
            currency: self.currency,
            exchange_rate: self.exchange_rate,
            transaction_date: self.transaction_date,
            running_balance: None,
            sequence,
            deleted_at: None,
        }
    }
}
