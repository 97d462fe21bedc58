use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

use crate::http::{Method, Status};

/// Sink for request lifecycle metrics.
///
/// Implementations must tolerate concurrent recording from every connection
/// coroutine; snapshot reads are eventually consistent.
pub trait HttpMetrics: Send + Sync {
    fn connection_opened(&self);
    fn connection_closed(&self);
    /// Record one completed request cycle. `method` is `None` when parsing
    /// failed before a request existed.
    fn record_request(
        &self,
        method: Option<Method>,
        status: Status,
        duration_ms: u64,
        bytes_written: u64,
    );
    fn snapshot(&self) -> MetricsSnapshot;
}

/// Immutable counter snapshot for export. Key names are part of the wire
/// contract of the metrics endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub active_connections: i64,
    pub bytes_sent: u64,
    pub status_counts: BTreeMap<String, u64>,
    pub latency_buckets: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    pub fn empty() -> Self {
        Self {
            total_requests: 0,
            active_connections: 0,
            bytes_sent: 0,
            status_counts: BTreeMap::new(),
            latency_buckets: BTreeMap::new(),
        }
    }
}

const STATUS_CLASSES: [&str; 4] = ["SUCCESS", "CLIENT_ERROR", "SERVER_ERROR", "OTHER"];
const LATENCY_LABELS: [&str; 4] = ["lt_100ms", "lt_500ms", "lt_1s", "gte_1s"];
const LATENCY_BOUNDS_MS: [u64; 3] = [100, 500, 1_000];

/// In-memory recorder backed by per-field atomics. Individual adds are
/// relaxed and independent; a snapshot may straddle a concurrent update,
/// which is fine for polling-style export.
#[derive(Default)]
pub struct MetricsRecorder {
    total_requests: AtomicU64,
    active_connections: AtomicI64,
    bytes_sent: AtomicU64,
    status_classes: [AtomicU64; 4],
    latency_buckets: [AtomicU64; 4],
    method_counts: [AtomicU64; 9],
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests recorded for one method; parse failures carry no method and
    /// are visible only in the totals.
    pub fn method_count(&self, method: Method) -> u64 {
        self.method_counts[method as usize].load(Ordering::Relaxed)
    }

    fn status_class_index(status: Status) -> usize {
        if status.is_success() {
            0
        } else if status.is_client_error() {
            1
        } else if status.is_server_error() {
            2
        } else {
            3
        }
    }

    fn latency_index(duration_ms: u64) -> usize {
        LATENCY_BOUNDS_MS
            .iter()
            .position(|&bound| duration_ms < bound)
            .unwrap_or(LATENCY_BOUNDS_MS.len())
    }
}

impl HttpMetrics for MetricsRecorder {
    fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    fn record_request(
        &self,
        method: Option<Method>,
        status: Status,
        duration_ms: u64,
        bytes_written: u64,
    ) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes_written, Ordering::Relaxed);
        if let Some(method) = method {
            self.method_counts[method as usize].fetch_add(1, Ordering::Relaxed);
        }
        self.status_classes[Self::status_class_index(status)].fetch_add(1, Ordering::Relaxed);
        self.latency_buckets[Self::latency_index(duration_ms)].fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let status_counts = STATUS_CLASSES
            .iter()
            .zip(self.status_classes.iter())
            .map(|(label, counter)| (label.to_string(), counter.load(Ordering::Relaxed)))
            .collect();
        let latency_buckets = LATENCY_LABELS
            .iter()
            .zip(self.latency_buckets.iter())
            .map(|(label, counter)| (label.to_string(), counter.load(Ordering::Relaxed)))
            .collect();
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            status_counts,
            latency_buckets,
        }
    }
}
