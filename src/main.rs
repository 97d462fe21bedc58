use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use basalt::config::ServerConfig;
use basalt::handler::{FileHandler, MetricsHandler, ServiceHandler};
use basalt::observability::{AccessLogger, HttpMetrics, MetricsRecorder, ObservabilityConfig};
use basalt::parser::RequestParser;
use basalt::server::{ConnectionDriver, HttpServer};
use basalt::telemetry;

fn main() -> anyhow::Result<()> {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    telemetry::init_logging(&log_level)?;

    let config = ServerConfig::from_env();
    let observability = ObservabilityConfig::from_env();
    may::config().set_stack_size(config.stack_size);

    let metrics: Arc<dyn HttpMetrics> = Arc::new(MetricsRecorder::new());
    let handler = ServiceHandler::new(
        observability.metrics_endpoint_path(),
        MetricsHandler::new(Some(metrics.clone())),
        FileHandler::new(&config.document_root),
    );
    let parser = RequestParser::new(
        config.max_request_line,
        config.max_header_section,
        config.max_headers,
        config.max_body,
    );
    let access_logger = AccessLogger::new(observability.is_access_log_enabled());
    let driver = ConnectionDriver::new(
        Arc::new(handler),
        Arc::new(parser),
        config.client_read_timeout,
        Some(metrics),
        observability,
        access_logger,
    );

    let port = config.port;
    let handle = HttpServer::new(driver)
        .start(("0.0.0.0", port))
        .with_context(|| format!("failed to bind 0.0.0.0:{port}"))?;
    info!("server started on 0.0.0.0:{port}");

    handle
        .join()
        .map_err(|e| anyhow::anyhow!("server terminated abnormally: {e:?}"))?;
    Ok(())
}
