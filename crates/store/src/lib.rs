//! Ledger store: the persistence boundary of the consistency engine.
//!
//! The engine talks to [`LedgerStore`] only. Every balance computation goes
//! through the store's active-legs view, so the soft-delete/status filter
//! lives in exactly one place. [`MemoryLedgerStore`] is the shipped
//! implementation; a database-backed adapter would implement the same trait.

pub mod memory;
pub mod store;

pub use memory::MemoryLedgerStore;
pub use store::{LedgerStore, NewLeg, ReplacedLegs};
