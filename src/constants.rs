//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTPS port for the admission webhook
pub const DEFAULT_WEBHOOK_PORT: u16 = 8443;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default number of concurrent reconcile workers
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default exponential backoff starting value (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 1000;

/// Default exponential backoff maximum value (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 300_000;

/// Default retry budget per request (0 = unlimited)
pub const DEFAULT_MAX_RECONCILE_RETRIES: u32 = 0;

/// Default delay before restarting a watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Namespaces skipped unless `EXCLUDED_NAMESPACES` says otherwise
pub const DEFAULT_EXCLUDED_NAMESPACES: &str = "kube-system,local-path-storage";

/// Path the API server calls for Secret validation
pub const WEBHOOK_VALIDATE_SECRET_PATH: &str = "/validate-v1-secret";

/// Rejection reason returned when the gate cannot read association records
pub const VALIDATION_UNAVAILABLE_REASON: &str = "validation unavailable";

/// Default tracing filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "secret_immutability_controller=info";
