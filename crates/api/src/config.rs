//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// How customers pay for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentType {
    #[default]
    VkPay,
    External,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `5000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; orders stay in memory when unset
/// - `MEDIA_DIR`: photo storage directory (default: `./uploads`)
/// - `VK_ACCESS_TOKEN`: community token for wall posting
/// - `VK_ORD_TOKEN`: ad registration token (default: `VK_ACCESS_TOKEN`)
/// - `VK_API_VERSION`: VK API version (default: `5.131`)
/// - `PAYMENT_TYPE`: `vk_pay`, anything else means external (default: `vk_pay`)
/// - `FRONTEND_URL`: base of external payment links (default: `http://localhost:3000`)
/// - `ORD_TIMEOUT_SECS`: ad registration timeout (default: `10`)
/// - `MEDIA_TIMEOUT_SECS`: per upload and publish timeout (default: `30`)
/// - `RETENTION_DAYS`: age after which orders are purged (default: `30`)
/// - `RETENTION_INTERVAL_SECS`: purge period (default: `3600`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub media_dir: PathBuf,
    pub vk_access_token: Option<String>,
    pub vk_ord_token: Option<String>,
    pub vk_api_version: String,
    pub payment_type: PaymentType,
    pub frontend_url: String,
    pub ord_timeout: Duration,
    pub media_timeout: Duration,
    pub retention_days: u32,
    pub retention_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        // Blank values count as unset
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let secs = |key: &str, default: Duration| {
            var(key)
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match var("LOG_FORMAT") {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: var("DATABASE_URL"),
            media_dir: var("MEDIA_DIR").map(PathBuf::from).unwrap_or(defaults.media_dir),
            vk_access_token: var("VK_ACCESS_TOKEN"),
            vk_ord_token: var("VK_ORD_TOKEN"),
            vk_api_version: var("VK_API_VERSION").unwrap_or(defaults.vk_api_version),
            payment_type: match var("PAYMENT_TYPE") {
                Some(t) if t != "vk_pay" => PaymentType::External,
                _ => PaymentType::VkPay,
            },
            frontend_url: var("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            ord_timeout: secs("ORD_TIMEOUT_SECS", defaults.ord_timeout),
            media_timeout: secs("MEDIA_TIMEOUT_SECS", defaults.media_timeout),
            retention_days: var("RETENTION_DAYS")
                .and_then(|d| d.trim().parse().ok())
                .unwrap_or(defaults.retention_days),
            retention_interval: secs("RETENTION_INTERVAL_SECS", defaults.retention_interval),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Token for ad registration, falling back to the community token.
    pub fn ord_token(&self) -> Option<&str> {
        self.vk_ord_token
            .as_deref()
            .or(self.vk_access_token.as_deref())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            media_dir: PathBuf::from("./uploads"),
            vk_access_token: None,
            vk_ord_token: None,
            vk_api_version: lifecycle::services::VK_API_VERSION.to_string(),
            payment_type: PaymentType::VkPay,
            frontend_url: "http://localhost:3000".to_string(),
            ord_timeout: Duration::from_secs(10),
            media_timeout: Duration::from_secs(30),
            retention_days: 30,
            retention_interval: Duration::from_secs(3600),
        }
    }
}
