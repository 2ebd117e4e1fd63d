//! # Controller Configuration
//!
//! Reconciler and work queue settings loaded from environment variables.

use super::{env_var_or_default, env_var_or_default_str};
use crate::constants::{
    DEFAULT_BACKOFF_MAX_MS, DEFAULT_BACKOFF_START_MS, DEFAULT_EXCLUDED_NAMESPACES,
    DEFAULT_MAX_RECONCILE_RETRIES, DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
    DEFAULT_WORKER_COUNT,
};
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Number of worker tasks draining the reconcile queue
    pub worker_count: usize,
    /// Exponential backoff starting value (milliseconds)
    /// Delay before the first retry of a failed request
    pub backoff_start_ms: u64,
    /// Exponential backoff maximum value (milliseconds)
    pub backoff_max_ms: u64,
    /// Retry budget per request, 0 means retry forever
    pub max_reconcile_retries: u32,
    /// Watch stream restart delay after stream ends (seconds)
    pub watch_restart_delay_after_end_secs: u64,
    /// Namespaces the controller never reconciles
    pub excluded_namespaces: Vec<String>,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            backoff_start_ms: DEFAULT_BACKOFF_START_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            max_reconcile_retries: DEFAULT_MAX_RECONCILE_RETRIES,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            excluded_namespaces: parse_namespace_list(DEFAULT_EXCLUDED_NAMESPACES),
            log_format: "text".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            worker_count: env_var_or_default("WORKER_COUNT", DEFAULT_WORKER_COUNT).max(1),
            backoff_start_ms: env_var_or_default("BACKOFF_START_MS", DEFAULT_BACKOFF_START_MS),
            backoff_max_ms: env_var_or_default("BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX_MS),
            max_reconcile_retries: env_var_or_default(
                "MAX_RECONCILE_RETRIES",
                DEFAULT_MAX_RECONCILE_RETRIES,
            ),
            watch_restart_delay_after_end_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            ),
            excluded_namespaces: parse_namespace_list(&env_var_or_default_str(
                "EXCLUDED_NAMESPACES",
                DEFAULT_EXCLUDED_NAMESPACES,
            )),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
        }
    }

    /// Get backoff start duration
    pub fn backoff_start_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_start_ms)
    }

    /// Get backoff max duration
    pub fn backoff_max_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    /// Get watch restart delay after end duration
    pub fn watch_restart_delay_after_end_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }

    /// Retry budget as an option (`None` = unlimited)
    pub fn retry_budget(&self) -> Option<u32> {
        (self.max_reconcile_retries > 0).then_some(self.max_reconcile_retries)
    }
}

/// Split a comma separated namespace list, dropping blanks
pub(crate) fn parse_namespace_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|ns| !ns.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_excludes_system_namespaces() {
        let config = ControllerConfig::default();
        assert_eq!(
            config.excluded_namespaces,
            vec!["kube-system".to_string(), "local-path-storage".to_string()]
        );
    }

    #[test]
    fn test_parse_namespace_list_trims_and_skips_blanks() {
        assert_eq!(
            parse_namespace_list(" kube-system, ,monitoring ,"),
            vec!["kube-system".to_string(), "monitoring".to_string()]
        );
        assert!(parse_namespace_list("").is_empty());
    }

    #[test]
    fn test_retry_budget_zero_means_unlimited() {
        let mut config = ControllerConfig::default();
        assert_eq!(config.retry_budget(), None);
        config.max_reconcile_retries = 5;
        assert_eq!(config.retry_budget(), Some(5));
    }
}
