use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crate::domain::order::{Currency, OrderSettings, StatusPolicy};

const DEFAULT_CURRENCY: &str = "SEK";
const DEFAULT_IMPORT_BATCH_SIZE: usize = 100;
const DEFAULT_IMPORT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_PAGE_SIZE: u32 = 20;
const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// Storefront order service: seeds the store, runs an order lifecycle and imports order feeds
#[derive(Parser, Debug, Clone)]
#[command(name = "storefront_orders")]
pub struct AppConfig {
    /// Postgres connection string. Without it the in-memory store is used.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Currency for orders that do not name one
    #[arg(long, env = "DEFAULT_CURRENCY", default_value = DEFAULT_CURRENCY)]
    pub default_currency: String,

    /// Which status changes are accepted
    #[arg(long, env = "STATUS_POLICY", value_enum, default_value_t = StatusPolicy::Strict)]
    pub status_policy: StatusPolicy,

    /// Orders committed per import transaction
    #[arg(long, env = "IMPORT_BATCH_SIZE", default_value_t = DEFAULT_IMPORT_BATCH_SIZE)]
    pub import_batch_size: usize,

    /// Attempts per import batch on transient store errors
    #[arg(long, env = "IMPORT_RETRY_ATTEMPTS", default_value_t = DEFAULT_IMPORT_RETRY_ATTEMPTS)]
    pub import_retry_attempts: u32,

    #[arg(long, env = "DEFAULT_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub default_page_size: u32,

    #[arg(long, env = "MAX_PAGE_SIZE", default_value_t = DEFAULT_MAX_PAGE_SIZE)]
    pub max_page_size: u32,

    /// JSON file with products and customers. The built-in demo set is used otherwise.
    #[arg(long, env = "SEED_FILE")]
    pub seed_file: Option<PathBuf>,

    /// JSON array of order records to import after start-up
    #[arg(long, env = "IMPORT_FILE")]
    pub import_file: Option<PathBuf>,

    /// Serve /metrics and /health on this port and keep running until Ctrl-C
    #[arg(long, env = "METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            default_currency: DEFAULT_CURRENCY.to_string(),
            status_policy: StatusPolicy::Strict,
            import_batch_size: DEFAULT_IMPORT_BATCH_SIZE,
            import_retry_attempts: DEFAULT_IMPORT_RETRY_ATTEMPTS,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            seed_file: None,
            import_file: None,
            metrics_port: None,
        }
    }
}

impl AppConfig {
    pub fn currency(&self) -> anyhow::Result<Currency> {
        Currency::parse(&self.default_currency)
            .map_err(anyhow::Error::msg)
            .context("Invalid DEFAULT_CURRENCY")
    }

    pub fn order_settings(&self) -> anyhow::Result<OrderSettings> {
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            anyhow::bail!(
                "DEFAULT_PAGE_SIZE must be between 1 and MAX_PAGE_SIZE ({}), got {}",
                self.max_page_size,
                self.default_page_size
            );
        }

        Ok(OrderSettings {
            default_currency: self.currency()?,
            status_policy: self.status_policy,
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
        })
    }
}
