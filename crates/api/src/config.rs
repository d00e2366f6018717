//! Application configuration loaded from environment variables.

use std::time::Duration;

use checkout::{CheckoutConfig, RetryConfig};

/// Log output format selected with `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3003`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
/// - `INSTANCE_ID` — reported by `/health` (default: `"local"`)
/// - `DATABASE_URL` — Postgres connection; unset keeps everything in memory
/// - `CART_SERVICE_URL`, `PRODUCT_SERVICE_URL` — collaborator base URLs;
///   unset means direct Postgres access when a database is configured, or
///   in-memory services otherwise
/// - `CALL_TIMEOUT_MS` — deadline per collaborator call (default: `5000`)
/// - `PAYMENT_LATENCY_MS` — simulated gateway latency (default: `1000`)
/// - `FULFILLMENT_MAX_ATTEMPTS`, `FULFILLMENT_BASE_DELAY_MS`,
///   `FULFILLMENT_MAX_DELAY_MS` — side-effect retry policy
///   (defaults: `3`, `100`, `5000`)
/// - `SHUTDOWN_GRACE_MS` — how long shutdown waits for background
///   fulfillment before logging it as interrupted (default: `10000`)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub instance_id: String,
    pub database_url: Option<String>,
    pub cart_service_url: Option<String>,
    pub product_service_url: Option<String>,
    pub call_timeout: Duration,
    pub payment_latency: Duration,
    pub fulfillment_max_attempts: u32,
    pub fulfillment_base_delay: Duration,
    pub fulfillment_max_delay: Duration,
    pub shutdown_grace: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// missing or unparseable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let millis = |key: &str, default: Duration| {
            non_empty(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: non_empty("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match non_empty("LOG_FORMAT").as_deref().map(str::trim) {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            instance_id: non_empty("INSTANCE_ID").unwrap_or(defaults.instance_id),
            database_url: non_empty("DATABASE_URL"),
            cart_service_url: non_empty("CART_SERVICE_URL"),
            product_service_url: non_empty("PRODUCT_SERVICE_URL"),
            call_timeout: millis("CALL_TIMEOUT_MS", defaults.call_timeout),
            payment_latency: millis("PAYMENT_LATENCY_MS", defaults.payment_latency),
            fulfillment_max_attempts: non_empty("FULFILLMENT_MAX_ATTEMPTS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.fulfillment_max_attempts),
            fulfillment_base_delay: millis(
                "FULFILLMENT_BASE_DELAY_MS",
                defaults.fulfillment_base_delay,
            ),
            fulfillment_max_delay: millis("FULFILLMENT_MAX_DELAY_MS", defaults.fulfillment_max_delay),
            shutdown_grace: millis("SHUTDOWN_GRACE_MS", defaults.shutdown_grace),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Settings handed to the checkout coordinator.
    pub fn checkout(&self) -> CheckoutConfig {
        CheckoutConfig {
            call_timeout: self.call_timeout,
            fulfillment_retry: RetryConfig {
                max_attempts: self.fulfillment_max_attempts.max(1),
                base_delay: self.fulfillment_base_delay,
                max_delay: self.fulfillment_max_delay,
                ..RetryConfig::default()
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3003,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            instance_id: "local".to_string(),
            database_url: None,
            cart_service_url: None,
            product_service_url: None,
            call_timeout: Duration::from_secs(5),
            payment_latency: Duration::from_millis(1000),
            fulfillment_max_attempts: 3,
            fulfillment_base_delay: Duration::from_millis(100),
            fulfillment_max_delay: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}
