//! Request handling strategies.
//!
//! A handler turns one parsed request into a response; the connection loop
//! owns everything before and after that. Routing is fixed: the metrics
//! endpoint path is matched exactly before any file resolution happens, and
//! every other path is served from the document root.

use std::io;

mod file;
mod metrics;

pub use file::FileHandler;
pub use metrics::MetricsHandler;

use crate::http::{Request, Response};

/// Strategy for turning a request into a response.
///
/// Implementations are shared across connections and must therefore be
/// stateless beyond immutable configuration. I/O failures bubble up and are
/// funnelled into a 500 by the connection loop.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: &Request) -> io::Result<Response>;
}

/// The server's fixed two-way dispatch: metrics endpoint, then files.
pub struct ServiceHandler {
    metrics_path: String,
    metrics: MetricsHandler,
    files: FileHandler,
}

impl ServiceHandler {
    pub fn new(metrics_path: &str, metrics: MetricsHandler, files: FileHandler) -> Self {
        Self {
            metrics_path: metrics_path.to_string(),
            metrics,
            files,
        }
    }
}

impl RequestHandler for ServiceHandler {
    fn handle(&self, request: &Request) -> io::Result<Response> {
        if request.path() == self.metrics_path {
            return self.metrics.handle(request);
        }
        self.files.handle(request)
    }
}
