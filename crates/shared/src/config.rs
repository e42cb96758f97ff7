//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Ledger configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Rebuild queue configuration.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Exchange rate service configuration.
    #[serde(default)]
    pub rates: RatesConfig,
}

/// Ledger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Base currency used for seeding the default chart of accounts.
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_currency: default_base_currency(),
        }
    }
}

fn default_base_currency() -> String {
    "USD".to_string()
}

/// Rebuild queue configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Debounce window before a batch is drawn, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Maximum number of accounts rebuilt per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum retry attempts before an account is abandoned.
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    /// Base delay for linear retry backoff, in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            batch_size: default_batch_size(),
            retry_limit: default_retry_limit(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    250
}

fn default_batch_size() -> usize {
    8
}

fn default_retry_limit() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

/// Exchange rate service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RatesConfig {
    /// Time-to-live for a cached rate table, in seconds.
    #[serde(default = "default_rates_ttl_secs")]
    pub ttl_secs: u64,
    /// Base URL of the remote rate provider.
    #[serde(default = "default_provider_url")]
    pub provider_url: String,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_rates_ttl_secs(),
            provider_url: default_provider_url(),
        }
    }
}

fn default_rates_ttl_secs() -> u64 {
    3600 // 1 hour
}

fn default_provider_url() -> String {
    "https://api.frankfurter.dev/v1/latest".to_string()
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("TALLY").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
