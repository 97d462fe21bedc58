use crate::config::read_bool_env;

const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Gates for access logging and metric recording, plus the path that exposes
/// the metrics snapshot. Cheap to clone and safe to share.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    access_log_enabled: bool,
    metrics_enabled: bool,
    metrics_endpoint_path: String,
}

impl ObservabilityConfig {
    pub fn new(access_log_enabled: bool, metrics_enabled: bool, metrics_endpoint_path: &str) -> Self {
        let metrics_endpoint_path = if metrics_endpoint_path.trim().is_empty() {
            DEFAULT_METRICS_PATH.to_string()
        } else {
            metrics_endpoint_path.to_string()
        };
        Self {
            access_log_enabled,
            metrics_enabled,
            metrics_endpoint_path,
        }
    }

    pub fn from_env() -> Self {
        let path = std::env::var("OBS_METRICS_ENDPOINT_PATH")
            .unwrap_or_else(|_| DEFAULT_METRICS_PATH.to_string());
        Self::new(
            read_bool_env("OBS_ACCESS_LOG_ENABLED", true),
            read_bool_env("OBS_METRICS_ENABLED", true),
            &path,
        )
    }

    /// Everything off, for tests exercising the wire without log noise.
    pub fn disabled() -> Self {
        Self::new(false, false, DEFAULT_METRICS_PATH)
    }

    pub fn is_access_log_enabled(&self) -> bool {
        self.access_log_enabled
    }

    pub fn is_metrics_enabled(&self) -> bool {
        self.metrics_enabled
    }

    pub fn metrics_endpoint_path(&self) -> &str {
        &self.metrics_endpoint_path
    }
}
