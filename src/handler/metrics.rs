use std::io;
use std::sync::Arc;

use super::RequestHandler;
use crate::http::{Method, Request, Response, Status};
use crate::observability::{HttpMetrics, MetricsSnapshot};

/// Serves a JSON snapshot of the shared metrics recorder.
pub struct MetricsHandler {
    metrics: Option<Arc<dyn HttpMetrics>>,
}

impl MetricsHandler {
    pub fn new(metrics: Option<Arc<dyn HttpMetrics>>) -> Self {
        Self { metrics }
    }
}

impl RequestHandler for MetricsHandler {
    fn handle(&self, request: &Request) -> io::Result<Response> {
        if request.method() != Method::Get {
            return Ok(Response::method_not_allowed("GET"));
        }

        let snapshot = match &self.metrics {
            Some(metrics) => metrics.snapshot(),
            None => MetricsSnapshot::empty(),
        };
        let json = serde_json::to_string(&snapshot).map_err(io::Error::other)?;

        Ok(Response::new()
            .with_status(Status::Ok)
            .with_content_type("application/json; charset=UTF-8")
            .with_keep_alive(true)
            .with_body(json))
    }
}
