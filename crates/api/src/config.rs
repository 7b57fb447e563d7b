//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: Postgres connection string; in-memory store when unset
/// - `CUSTOMER_SERVICE_URL`, `INVENTORY_SERVICE_URL`: collaborator base URLs;
///   seeded in-memory collaborators when unset
/// - `PAGSEGURO_BASE_URL`: gateway base URL (default: the sandbox)
/// - `PAGSEGURO_TOKEN`: gateway token; in-memory gateway when unset
/// - `NOTIFICATION_URL`: webhook URL handed to the gateway
/// - `HTTP_TIMEOUT_SECS`: outbound request timeout (default: `10`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub customer_service_url: Option<String>,
    pub inventory_service_url: Option<String>,
    pub pagseguro_base_url: String,
    pub pagseguro_token: Option<String>,
    pub notification_url: Option<String>,
    pub http_timeout: Duration,
}

const DEFAULT_PAGSEGURO_URL: &str = "https://sandbox.api.pagseguro.com";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: var("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or_default(),
            database_url: var("DATABASE_URL"),
            customer_service_url: var("CUSTOMER_SERVICE_URL"),
            inventory_service_url: var("INVENTORY_SERVICE_URL"),
            pagseguro_base_url: var("PAGSEGURO_BASE_URL").unwrap_or(defaults.pagseguro_base_url),
            pagseguro_token: var("PAGSEGURO_TOKEN"),
            notification_url: var("NOTIFICATION_URL"),
            http_timeout: var("HTTP_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Notification URLs handed to the payment gateway.
    pub fn notification_urls(&self) -> Vec<String> {
        self.notification_url.iter().cloned().collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            customer_service_url: None,
            inventory_service_url: None,
            pagseguro_base_url: DEFAULT_PAGSEGURO_URL.to_string(),
            pagseguro_token: None,
            notification_url: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}
