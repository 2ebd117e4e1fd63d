//! # Controller Configuration
//!
//! Process-level configuration loaded from environment variables (populated from a ConfigMap
//! via `envFrom` in the deployment).
//!
//! All configuration has sensible defaults and can be overridden via environment variables.

mod controller;
mod server;
mod webhook;

pub use controller::ControllerConfig;
pub use server::ServerConfig;
pub use webhook::{AdmissionScope, WebhookConfig};

/// Load configuration from environment variables with defaults
pub fn load_config() -> (ControllerConfig, ServerConfig, WebhookConfig) {
    (
        ControllerConfig::from_env(),
        ServerConfig::from_env(),
        WebhookConfig::from_env(),
    )
}

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
pub(crate) fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| parse_bool(&v))
        .unwrap_or(default)
}

/// Read environment variable as string or return default
pub(crate) fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(value: &str) -> bool {
    let v_lower = value.to_lowercase();
    v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
}
