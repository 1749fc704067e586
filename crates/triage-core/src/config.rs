//! Configuration management for the triage console toolkit
//!
//! Configuration is loaded from `TRIAGE_*` environment variables. Every value
//! has a default, and unparseable values fall back to that default rather than
//! failing startup.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Default maximum number of cached responses.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;
/// Default cached response TTL in seconds.
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;
/// Default delay before a scheduled invalidation fires.
pub const DEFAULT_INVALIDATE_DELAY_MS: u64 = 0;
/// Default debounce quiet interval.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
/// Default throttle interval.
pub const DEFAULT_THROTTLE_MS: u64 = 1_000;
/// Default negation prefix for array filter values (`NOT(value)`).
pub const DEFAULT_NOT_PREFIX: &str = "NOT";
/// Default removal prefix for array filter values (`!(value)`).
pub const DEFAULT_REMOVE_PREFIX: &str = "!";

const STORAGE_DIR_NAME: &str = "triage-console";
const STORAGE_FILE_NAME: &str = "storage.json";
const FALLBACK_STORAGE_PATH: &str = "triage-storage.json";

/// Main configuration struct for the triage console toolkit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    // Response cache
    pub cache_enabled: bool,
    pub cache_max_entries: usize,
    pub cache_ttl_seconds: u64,
    /// Delay applied by invalidations that do not pass one explicitly.
    pub invalidate_delay_ms: u64,

    // Change gating
    pub debounce_ms: u64,
    pub throttle_ms: u64,

    // Persisted search parameters
    pub storage_path: PathBuf,

    // Array filter token prefixes
    pub not_prefix: String,
    pub remove_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            invalidate_delay_ms: DEFAULT_INVALIDATE_DELAY_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            throttle_ms: DEFAULT_THROTTLE_MS,
            storage_path: default_storage_path(),
            not_prefix: DEFAULT_NOT_PREFIX.to_string(),
            remove_prefix: DEFAULT_REMOVE_PREFIX.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Response cache
        config.cache_enabled = env_bool("TRIAGE_CACHE_ENABLED", config.cache_enabled);
        config.cache_max_entries = env_usize("TRIAGE_CACHE_MAX_ENTRIES", config.cache_max_entries);
        config.cache_ttl_seconds = env_u64("TRIAGE_CACHE_TTL_SECONDS", config.cache_ttl_seconds);
        config.invalidate_delay_ms =
            env_u64("TRIAGE_INVALIDATE_DELAY_MS", config.invalidate_delay_ms);

        // Change gating
        config.debounce_ms = env_u64("TRIAGE_DEBOUNCE_MS", config.debounce_ms);
        config.throttle_ms = env_u64("TRIAGE_THROTTLE_MS", config.throttle_ms);

        // Persisted search parameters
        if let Some(v) = env_value("TRIAGE_STORAGE_PATH").filter(|v| !v.trim().is_empty()) {
            config.storage_path = PathBuf::from(v.trim());
        }

        // Prefixes must be non-empty or the token grammar collapses.
        if let Some(v) = env_nonempty("TRIAGE_NOT_PREFIX") {
            config.not_prefix = v;
        }
        if let Some(v) = env_nonempty("TRIAGE_REMOVE_PREFIX") {
            config.remove_prefix = v;
        }

        if config.not_prefix == config.remove_prefix {
            tracing::warn!(
                prefix = %config.not_prefix,
                "TRIAGE_NOT_PREFIX equals TRIAGE_REMOVE_PREFIX; reverting both to defaults"
            );
            config.not_prefix = DEFAULT_NOT_PREFIX.to_string();
            config.remove_prefix = DEFAULT_REMOVE_PREFIX.to_string();
        }

        config
    }

    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    #[must_use]
    pub const fn invalidate_delay(&self) -> Duration {
        Duration::from_millis(self.invalidate_delay_ms)
    }

    #[must_use]
    pub const fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    #[must_use]
    pub const fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

/// `$XDG_CONFIG_HOME/triage-console/storage.json`, or a file in the working
/// directory when no config dir is known.
fn default_storage_path() -> PathBuf {
    dirs::config_dir().map_or_else(
        || PathBuf::from(FALLBACK_STORAGE_PATH),
        |dir| dir.join(STORAGE_DIR_NAME).join(STORAGE_FILE_NAME),
    )
}

#[cfg(test)]
thread_local! {
    static TEST_ENV_OVERRIDES: std::cell::RefCell<std::collections::HashMap<String, String>> =
        std::cell::RefCell::new(std::collections::HashMap::new());
}

#[cfg(test)]
fn test_env_override_value(key: &str) -> Option<String> {
    TEST_ENV_OVERRIDES.with(|cell| cell.borrow().get(key).cloned())
}

/// Read a value from the process environment.
#[must_use]
pub fn env_value(key: &str) -> Option<String> {
    #[cfg(test)]
    if let Some(v) = test_env_override_value(key) {
        return Some(v);
    }
    env::var(key).ok()
}

fn env_nonempty(key: &str) -> Option<String> {
    env_value(key).and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_bool(value: &str, default: bool) -> bool {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" => true,
        "0" | "false" | "f" | "no" | "n" => false,
        _ => default,
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env_value(key).map_or(default, |v| parse_bool(&v, default))
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_value(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env_value(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
