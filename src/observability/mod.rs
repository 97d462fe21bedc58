//! Access logging and HTTP metrics.
//!
//! Every connection iteration emits exactly one access-log entry and one
//! metrics record, on success and on every failure path alike. The metrics
//! recorder is the only mutable state shared between connections and uses
//! per-field atomics rather than a lock.

mod access_log;
mod config;
mod metrics;

pub use access_log::{AccessLogger, Entry};
pub use config::ObservabilityConfig;
pub use metrics::{HttpMetrics, MetricsRecorder, MetricsSnapshot};
