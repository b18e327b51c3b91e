//! Ledger runtime configuration.

use std::time::Duration;

use tracing::warn;

pub const ENV_MAX_CONFLICT_RETRIES: &str = "STOCKLEDGER_MAX_CONFLICT_RETRIES";
pub const ENV_LOCK_TIMEOUT_MS: &str = "STOCKLEDGER_LOCK_TIMEOUT_MS";
pub const ENV_HISTORY_PAGE_SIZE: &str = "STOCKLEDGER_HISTORY_PAGE_SIZE";
pub const ENV_DEFAULT_LIST_LIMIT: &str = "STOCKLEDGER_DEFAULT_LIST_LIMIT";

/// Ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Extra attempts after a `ConcurrencyConflict` before giving up
    pub max_conflict_retries: u32,
    /// Per-item lock wait; `None` waits until cancelled
    pub lock_timeout: Option<Duration>,
    /// Rows fetched per store round-trip when iterating history
    pub history_page_size: usize,
    /// Limit applied by `list_items` when the filter sets none
    pub default_list_limit: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
            lock_timeout: Some(Duration::from_secs(5)),
            history_page_size: 100,
            default_list_limit: 100,
        }
    }
}

impl LedgerConfig {
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_history_page_size(mut self, size: usize) -> Self {
        self.history_page_size = size.max(1);
        self
    }

    pub fn with_default_list_limit(mut self, limit: usize) -> Self {
        self.default_list_limit = limit.max(1);
        self
    }

    /// Read overrides from `STOCKLEDGER_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys keep their default;
    /// unparsable values are logged and ignored. A lock timeout of `0`
    /// disables the timeout.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let mut config = defaults.clone();

        if let Some(retries) = parse(&lookup, ENV_MAX_CONFLICT_RETRIES) {
            config.max_conflict_retries = retries;
        }
        if let Some(ms) = parse::<u64>(&lookup, ENV_LOCK_TIMEOUT_MS) {
            config.lock_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(size) = parse::<usize>(&lookup, ENV_HISTORY_PAGE_SIZE) {
            config = config.with_history_page_size(size);
        }
        if let Some(limit) = parse::<usize>(&lookup, ENV_DEFAULT_LIST_LIMIT) {
            config = config.with_default_list_limit(limit);
        }

        if config != defaults {
            tracing::debug!(?config, "ledger config overridden from environment");
        }
        config
    }
}

fn parse<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable config value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_values_keep_defaults() {
        assert_eq!(LedgerConfig::from_lookup(lookup(&[])), LedgerConfig::default());
    }

    #[test]
    fn values_are_read_and_zero_timeout_disables_it() {
        let config = LedgerConfig::from_lookup(lookup(&[
            (ENV_MAX_CONFLICT_RETRIES, "7"),
            (ENV_LOCK_TIMEOUT_MS, "0"),
            (ENV_HISTORY_PAGE_SIZE, "2"),
            (ENV_DEFAULT_LIST_LIMIT, " 25 "),
        ]));
        assert_eq!(config.max_conflict_retries, 7);
        assert_eq!(config.lock_timeout, None);
        assert_eq!(config.history_page_size, 2);
        assert_eq!(config.default_list_limit, 25);
    }

    #[test]
    fn garbage_falls_back_to_default() {
        let config = LedgerConfig::from_lookup(lookup(&[
            (ENV_LOCK_TIMEOUT_MS, "soon"),
            (ENV_HISTORY_PAGE_SIZE, "0"),
        ]));
        assert_eq!(config.lock_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.history_page_size, 1);
    }
}
