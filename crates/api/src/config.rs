//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::{Money, PricingConfig};
use fulfillment::{DispatcherConfig, RetryPolicy};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset runs on the in-memory store
/// - `TAX_RATE_BPS`: flat tax rate in basis points (default: `1000`)
/// - `SHIPPING_BASELINE_CENTS`: shipping charge (default: `1000`)
/// - `ORDER_TX_MAX_ATTEMPTS`: attempts per order transaction (default: `3`)
/// - `NOTIFICATION_TIMEOUT_MS`: per-delivery timeout (default: `5000`)
/// - `NOTIFICATION_QUEUE_CAPACITY`: pending notification bound (default: `1024`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub pricing: PricingConfig,
    pub order_tx_max_attempts: u32,
    pub notification_timeout: Duration,
    pub notification_queue_capacity: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let lookup = &lookup;

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(lookup, "PORT")?.unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            pricing: PricingConfig {
                shipping_baseline: parse_var(lookup, "SHIPPING_BASELINE_CENTS")?
                    .map(Money::from_cents)
                    .unwrap_or(defaults.pricing.shipping_baseline),
                tax_rate_bps: parse_var(lookup, "TAX_RATE_BPS")?
                    .unwrap_or(defaults.pricing.tax_rate_bps),
            },
            order_tx_max_attempts: parse_var(lookup, "ORDER_TX_MAX_ATTEMPTS")?
                .unwrap_or(defaults.order_tx_max_attempts),
            notification_timeout: parse_var(lookup, "NOTIFICATION_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.notification_timeout),
            notification_queue_capacity: parse_var(lookup, "NOTIFICATION_QUEUE_CAPACITY")?
                .unwrap_or(defaults.notification_queue_capacity),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.order_tx_max_attempts)
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            queue_capacity: self.notification_queue_capacity.max(1),
            delivery_timeout: self.notification_timeout,
            ..DispatcherConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let dispatcher = DispatcherConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            pricing: PricingConfig::default(),
            order_tx_max_attempts: RetryPolicy::default().max_attempts,
            notification_timeout: dispatcher.delivery_timeout,
            notification_queue_capacity: dispatcher.queue_capacity,
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
