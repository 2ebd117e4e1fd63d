//! # Controller
//!
//! Core controller modules for the Secret Immutability Controller.
//!
//! - `extractor`: secrets consumed by protected containers of a pod
//! - `association`: merging discovered secrets into `ImmutableImages`
//! - `tagging`: marking secrets immutable
//! - `reconciler`: per-record reconciliation
//! - `fanout`: pod events to reconcile requests
//! - `scope`: excluded namespaces
//! - `queue`: deduplicating work queue
//! - `backoff`: exponential backoff for retries
//! - `server`: HTTP server for metrics and health checks

pub mod association;
pub mod backoff;
pub mod extractor;
pub mod fanout;
pub mod queue;
pub mod reconciler;
pub mod scope;
pub mod server;
pub mod tagging;
