//! Storage engine configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default maximum serialized item size in bytes.
pub const DEFAULT_MAX_ITEM_SIZE: u64 = 64 * 1024;

/// Default number of concurrent puts of a bulk load.
pub const DEFAULT_BULK_CONCURRENCY: usize = 16;

/// Storage engine configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Delay between `create_table` and the table becoming ACTIVE.
    /// Zero activates the table before `create_table` returns.
    pub table_activation_delay: Duration,
    /// Time a deleted table stays visible in DELETING before removal.
    /// Zero removes the table before `delete_table` returns.
    pub table_removal_delay: Duration,
    /// Largest accepted item, in bytes.
    pub max_item_size: u64,
    /// Upper bound on in-flight puts during a bulk load.
    pub bulk_concurrency: usize,
    /// Include the error source chain in error bodies.
    pub show_trace: bool,
}

impl StorageConfig {
    /// Create configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            table_activation_delay: Duration::from_millis(env_parse(
                "MAGNETODB_TABLE_ACTIVATION_DELAY_MS",
                0,
            )),
            table_removal_delay: Duration::from_millis(env_parse(
                "MAGNETODB_TABLE_REMOVAL_DELAY_MS",
                0,
            )),
            max_item_size: env_parse("MAGNETODB_MAX_ITEM_SIZE", DEFAULT_MAX_ITEM_SIZE),
            bulk_concurrency: env_parse("MAGNETODB_BULK_CONCURRENCY", DEFAULT_BULK_CONCURRENCY)
                .max(1),
            show_trace: env_bool("MAGNETODB_SHOW_TRACE", false),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            table_activation_delay: Duration::ZERO,
            table_removal_delay: Duration::ZERO,
            max_item_size: DEFAULT_MAX_ITEM_SIZE,
            bulk_concurrency: DEFAULT_BULK_CONCURRENCY,
            show_trace: false,
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| {
        matches!(v.as_str(), "1" | "true" | "yes" | "TRUE" | "YES")
    })
}

fn env_parse<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, %default, "ignoring unparsable setting");
            default
        }),
        Err(_) => default,
    }
}
