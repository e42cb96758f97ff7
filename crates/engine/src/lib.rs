//! Ledger consistency engine.
//!
//! Keeps the denormalized running-balance cache honest against the
//! append-only journal log:
//!
//! - [`rebuilder`]: recomputes cached running balances for one account
//! - [`queue`]: debounced, batched, retrying rebuild scheduler
//! - [`auditor`]: cold-recomputes, compares, repairs, seeds first-run data
//! - [`rates`]: multi-currency normalization with tiered caching
//! - [`service`]: the operations exposed to UI/reporting collaborators

pub mod auditor;
pub mod queue;
pub mod rates;
pub mod rebuilder;
pub mod service;

use std::sync::Arc;

use tally_shared::AppConfig;
use tally_store::LedgerStore;

pub use auditor::{BalanceVerification, IntegrityAuditor, StartupReport};
pub use queue::RebuildQueue;
pub use rates::{HttpRateProvider, RateProvider, RateService};
pub use rebuilder::{BalanceRebuilder, RebuildOutcome};
pub use service::{AccountBalanceView, CreateJournalInput, LedgerService};

/// The fully wired engine.
pub struct Engine {
    /// The persistence boundary.
    pub store: Arc<dyn LedgerStore>,
    /// Journal create/update/delete and balance reads.
    pub service: LedgerService,
    /// Background rebuild scheduler.
    pub queue: RebuildQueue,
    /// Verify/repair and startup seeding.
    pub auditor: IntegrityAuditor,
    /// Exchange rate lookup and conversion.
    pub rates: RateService,
}

impl Engine {
    /// Wires store, rebuilder, queue, auditor and rate service together.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        provider: Arc<dyn RateProvider>,
        config: &AppConfig,
    ) -> Self {
        let rebuilder = BalanceRebuilder::new(Arc::clone(&store));
        let queue = RebuildQueue::new(rebuilder.clone(), config.queue.clone());
        let service = LedgerService::new(Arc::clone(&store), queue.clone());
        let auditor = IntegrityAuditor::new(
            Arc::clone(&store),
            rebuilder,
            config.ledger.base_currency.clone(),
        );
        let rates = RateService::new(provider, Arc::clone(&store), &config.rates);
        Self {
            store,
            service,
            queue,
            auditor,
            rates,
        }
    }
}
