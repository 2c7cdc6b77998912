//! Application configuration management.

use serde::Deserialize;

use crate::types::pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger posting rules.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL (`postgres://...` or `sqlite:...`).
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

impl DatabaseConfig {
    /// Creates a configuration for `url` with default pool sizes.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

/// How the balance checker treats entries whose lines use several currencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrencyPolicy {
    /// Each currency's debits and credits must balance independently.
    #[default]
    PerCurrency,
    /// All lines of an entry must share one currency.
    SingleCurrency,
}

/// Ledger posting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Mixed-currency policy for new entries.
    #[serde(default)]
    pub currency_policy: CurrencyPolicy,
    /// Entries returned by a list call that does not specify a limit.
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
    /// Upper bound on entries returned by one list call.
    #[serde(default = "max_page_size")]
    pub max_page_size: u64,
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

fn max_page_size() -> u64 {
    MAX_PAGE_SIZE
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            currency_policy: CurrencyPolicy::default(),
            default_page_size: default_page_size(),
            max_page_size: max_page_size(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("TALLY").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("TALLY__DATABASE__URL", Some("sqlite::memory:")),
                ("TALLY__DATABASE__MAX_CONNECTIONS", Some("4")),
                ("TALLY__LEDGER__CURRENCY_POLICY", Some("single_currency")),
                ("TALLY__LEDGER__MAX_PAGE_SIZE", Some("25")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.url, "sqlite::memory:");
                assert_eq!(config.database.max_connections, 4);
                assert_eq!(config.database.min_connections, 1);
                assert_eq!(config.ledger.currency_policy, CurrencyPolicy::SingleCurrency);
                assert_eq!(config.ledger.default_page_size, DEFAULT_PAGE_SIZE);
                assert_eq!(config.ledger.max_page_size, 25);
            },
        );
    }

    #[test]
    fn test_load_requires_database_url() {
        temp_env::with_vars_unset(["TALLY__DATABASE__URL"], || {
            assert!(AppConfig::load().is_err());
        });
    }

    #[test]
    fn test_ledger_defaults() {
        let ledger = LedgerConfig::default();
        assert_eq!(ledger.currency_policy, CurrencyPolicy::PerCurrency);
        assert_eq!(ledger.default_page_size, 50);
        assert_eq!(ledger.max_page_size, 200);
    }
}
