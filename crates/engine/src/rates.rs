//! Exchange rates: remote provider, tiered caching, and conversion.
//!
//! Lookup order is in-memory table cache, then freshly persisted table,
//! then the remote provider. When the remote is down, the most recently
//! persisted table is served stale rather than failing the conversion.
//! Concurrent lookups for the same base currency share one fetch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use tally_core::{LedgerError, RateTable, round_amount};
use tally_shared::config::RatesConfig;
use tally_store::LedgerStore;

/// A source of full exchange-rate tables.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetches the current rate table for a base currency.
    async fn fetch_table(&self, base: &str) -> Result<RateTable, LedgerError>;
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    base: String,
    rates: std::collections::HashMap<String, Decimal>,
}

/// Fetches rate tables over HTTP from a frankfurter-style endpoint.
pub struct HttpRateProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRateProvider {
    /// Creates a provider against the given endpoint.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    async fn fetch_table(&self, base: &str) -> Result<RateTable, LedgerError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("base", base)])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| LedgerError::RateUnavailable {
                base: base.to_string(),
                reason: e.to_string(),
            })?;

        let body: ProviderResponse =
            response
                .json()
                .await
                .map_err(|e| LedgerError::RateUnavailable {
                    base: base.to_string(),
                    reason: format!("malformed rate response: {e}"),
                })?;

        Ok(RateTable {
            base: body.base,
            rates: body.rates,
            fetched_at: Utc::now(),
        })
    }
}

/// Rate lookup and currency conversion with tiered caching.
pub struct RateService {
    provider: Arc<dyn RateProvider>,
    store: Arc<dyn LedgerStore>,
    /// Per-base in-memory tier. `try_get_with` also collapses concurrent
    /// lookups for the same base into a single load.
    cache: moka::future::Cache<String, Arc<RateTable>>,
    ttl_secs: u64,
}

impl RateService {
    /// Creates the service with an in-memory table cache bounded by the
    /// configured TTL.
    #[must_use]
    pub fn new(
        provider: Arc<dyn RateProvider>,
        store: Arc<dyn LedgerStore>,
        config: &RatesConfig,
    ) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(64)
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .build();
        Self {
            provider,
            store,
            cache,
            ttl_secs: config.ttl_secs,
        }
    }

    /// Returns the rate from `from` to `to`.
    ///
    /// Identical currencies convert at exactly 1 without touching any
    /// cache tier or the remote provider.
    ///
    /// # Errors
    ///
    /// `NoExchangeRate` when the table lacks the target currency;
    /// `RateUnavailable` when no tier can produce a table at all.
    pub async fn get_rate(&self, from: &str, to: &str) -> Result<Decimal, LedgerError> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        let table = self.table(from).await?;
        table.rate_to(to).ok_or_else(|| LedgerError::NoExchangeRate {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Converts `amount` from one currency to another, rounding the result
    /// to `precision` decimal places with banker's rounding.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`RateService::get_rate`].
    pub async fn convert(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
        precision: u32,
    ) -> Result<Decimal, LedgerError> {
        let rate = self.get_rate(from, to).await?;
        Ok(round_amount(amount * rate, precision))
    }

    async fn table(&self, base: &str) -> Result<Arc<RateTable>, LedgerError> {
        self.cache
            .try_get_with(base.to_string(), self.load_table(base))
            .await
            .map_err(|e: Arc<LedgerError>| LedgerError::RateUnavailable {
                base: base.to_string(),
                reason: e.to_string(),
            })
    }

    /// The load path behind the in-memory tier: freshly persisted table,
    /// then remote fetch (persisted on success), then stale persisted
    /// fallback.
    async fn load_table(&self, base: &str) -> Result<Arc<RateTable>, LedgerError> {
        let persisted = self.store.load_rate_table(base).await?;

        if let Some(table) = &persisted {
            if table.is_fresh(Utc::now(), self.ttl_secs) {
                debug!(base, fetched_at = %table.fetched_at, "serving persisted rate table");
                return Ok(Arc::new(table.clone()));
            }
        }

        match self.provider.fetch_table(base).await {
            Ok(table) => {
                self.store.save_rate_table(table.clone()).await?;
                debug!(base, "fetched and persisted fresh rate table");
                Ok(Arc::new(table))
            }
            Err(fetch_err) => match persisted {
                Some(stale) => {
                    warn!(
                        base,
                        fetched_at = %stale.fetched_at,
                        error = %fetch_err,
                        "rate fetch failed, serving stale persisted table"
                    );
                    Ok(Arc::new(stale))
                }
                None => Err(fetch_err),
            },
        }
    }
}
