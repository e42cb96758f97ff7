//! Debounced, batched, retrying rebuild scheduler.
//!
//! Mutations enqueue `(account, from_date)` pairs; the queue coalesces
//! entries per account (keeping the earliest date), waits out a debounce
//! window, then runs rebuilds in bounded concurrent batches. Failed
//! rebuilds are retried with linear backoff up to a configured limit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use tally_shared::config::QueueConfig;
use tally_shared::types::AccountId;

use crate::rebuilder::BalanceRebuilder;

/// Handle to the rebuild scheduler. Cheap to clone.
#[derive(Clone)]
pub struct RebuildQueue {
    shared: Arc<Shared>,
}

struct Shared {
    rebuilder: BalanceRebuilder,
    config: QueueConfig,
    state: Mutex<QueueState>,
    // bumped after every batch; flush() waits on it while a batch runs
    batch_done: watch::Sender<u64>,
}

#[derive(Default)]
struct QueueState {
    /// Earliest requested rebuild date per account.
    pending: HashMap<AccountId, DateTime<Utc>>,
    /// Consecutive failure count per account.
    retries: HashMap<AccountId, u32>,
    /// The armed debounce timer, if any.
    timer: Option<JoinHandle<()>>,
    /// True while a batch is executing.
    processing: bool,
    /// Set by `stop`; no further work is scheduled.
    stopped: bool,
}

impl RebuildQueue {
    /// Creates a queue that drives the given rebuilder.
    #[must_use]
    pub fn new(rebuilder: BalanceRebuilder, config: QueueConfig) -> Self {
        let (batch_done, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                rebuilder,
                config,
                state: Mutex::new(QueueState::default()),
                batch_done,
            }),
        }
    }

    /// Requests a rebuild of `account_id` from `from_date` onward.
    ///
    /// Repeated requests for the same account merge to the earliest date,
    /// so a burst of edits costs one rebuild over the widest window.
    pub async fn enqueue(&self, account_id: AccountId, from_date: DateTime<Utc>) {
        let mut state = self.shared.state.lock().await;
        if state.stopped {
            return;
        }
        state
            .pending
            .entry(account_id)
            .and_modify(|d| {
                if from_date < *d {
                    *d = from_date;
                }
            })
            .or_insert(from_date);
        debug!(%account_id, %from_date, pending = state.pending.len(), "rebuild enqueued");
        if !state.processing && state.timer.is_none() {
            self.arm_timer(&mut state);
        }
    }

    /// Enqueues several accounts at once with a shared start date.
    pub async fn enqueue_many(
        &self,
        accounts: impl IntoIterator<Item = AccountId>,
        from_date: DateTime<Utc>,
    ) {
        for account_id in accounts {
            self.enqueue(account_id, from_date).await;
        }
    }

    /// Drains the queue, running pending batches inline until nothing is
    /// left. If a background batch is mid-flight, waits for it first.
    pub async fn flush(&self) {
        loop {
            // subscribe before inspecting state so a completion between the
            // check and the await cannot be missed
            let mut done = self.shared.batch_done.subscribe();
            {
                let mut state = self.shared.state.lock().await;
                if let Some(timer) = state.timer.take() {
                    timer.abort();
                }
                if !state.processing {
                    if state.pending.is_empty() {
                        return;
                    }
                    drop(state);
                    self.run_batch().await;
                    continue;
                }
            }
            if done.changed().await.is_err() {
                return;
            }
        }
    }

    /// Stops the queue: cancels the timer and discards pending work.
    pub async fn stop(&self) {
        let mut state = self.shared.state.lock().await;
        state.stopped = true;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        let discarded = state.pending.len();
        state.pending.clear();
        state.retries.clear();
        info!(discarded, "rebuild queue stopped");
    }

    /// The pending rebuild window for an account, if one is queued.
    pub async fn pending_window(&self, account_id: AccountId) -> Option<DateTime<Utc>> {
        self.shared.state.lock().await.pending.get(&account_id).copied()
    }

    fn arm_timer(&self, state: &mut QueueState) {
        let queue = self.clone();
        let debounce = Duration::from_millis(self.shared.config.debounce_ms);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            queue.run_batch().await;
        }));
    }

    async fn run_batch(&self) {
        let batch: Vec<(AccountId, DateTime<Utc>)> = {
            let mut state = self.shared.state.lock().await;
            state.timer = None;
            if state.processing || state.stopped || state.pending.is_empty() {
                return;
            }
            let ids: Vec<AccountId> = state
                .pending
                .keys()
                .copied()
                .take(self.shared.config.batch_size)
                .collect();
            let batch = ids
                .into_iter()
                .filter_map(|id| state.pending.remove(&id).map(|d| (id, d)))
                .collect();
            state.processing = true;
            batch
        };

        debug!(batch = batch.len(), "running rebuild batch");
        let tasks: Vec<_> = batch
            .into_iter()
            .map(|(account_id, from_date)| {
                let rebuilder = self.shared.rebuilder.clone();
                tokio::spawn(async move {
                    let result = rebuilder.rebuild(account_id, Some(from_date)).await;
                    (account_id, from_date, result)
                })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            match task {
                Ok((account_id, _, Ok(_))) => {
                    self.shared.state.lock().await.retries.remove(&account_id);
                }
                Ok((account_id, from_date, Err(err))) => {
                    self.handle_failure(account_id, from_date, &err.to_string()).await;
                }
                Err(join_err) => {
                    error!(error = %join_err, "rebuild task panicked");
                }
            }
        }

        let mut state = self.shared.state.lock().await;
        state.processing = false;
        if !state.pending.is_empty() && !state.stopped && state.timer.is_none() {
            self.arm_timer(&mut state);
        }
        drop(state);
        self.shared.batch_done.send_modify(|n| *n += 1);
    }

    async fn handle_failure(&self, account_id: AccountId, from_date: DateTime<Utc>, reason: &str) {
        let attempt = {
            let mut state = self.shared.state.lock().await;
            if state.stopped {
                return;
            }
            let attempt = state.retries.entry(account_id).or_insert(0);
            *attempt += 1;
            *attempt
        };

        if attempt > self.shared.config.retry_limit {
            self.shared.state.lock().await.retries.remove(&account_id);
            error!(
                %account_id,
                attempts = attempt,
                reason,
                "rebuild abandoned after exhausting retries"
            );
            return;
        }

        let delay =
            Duration::from_millis(self.shared.config.retry_base_delay_ms * u64::from(attempt));
        warn!(%account_id, attempt, delay_ms = delay.as_millis() as u64, reason, "rebuild failed, retrying");
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.enqueue(account_id, from_date).await;
        });
    }
}
