use tracing::info;

use crate::http::{Method, Status, Version};

/// One structured record describing a request/response cycle. Fields with no
/// available request data render as `-`.
#[derive(Debug)]
pub struct Entry<'a> {
    pub remote: &'a str,
    pub method: Option<Method>,
    pub path: Option<&'a str>,
    pub query: Option<String>,
    pub version: Version,
    pub status: Status,
    pub content_length: u64,
    pub bytes_written: u64,
    pub duration_ms: u64,
    pub keep_alive: bool,
    pub request_id: &'a str,
}

/// Emits one access-log line per request cycle on the `http.access` target,
/// so deployments can filter or route it independently of server diagnostics.
#[derive(Debug, Clone)]
pub struct AccessLogger {
    enabled: bool,
}

impl AccessLogger {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn log(&self, entry: &Entry<'_>) {
        if !self.enabled {
            return;
        }
        info!(
            target: "http.access",
            remote = entry.remote,
            method = entry.method.map(Method::as_str).unwrap_or("-"),
            path = entry.path.unwrap_or("-"),
            query = entry.query.as_deref().unwrap_or("-"),
            version = entry.version.as_str(),
            status = entry.status.code(),
            duration_ms = entry.duration_ms,
            bytes = entry.bytes_written,
            content_length = entry.content_length,
            keep_alive = entry.keep_alive,
            request_id = entry.request_id,
        );
    }
}
