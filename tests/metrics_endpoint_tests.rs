mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use basalt::handler::{FileHandler, MetricsHandler, ServiceHandler};
use basalt::observability::{AccessLogger, HttpMetrics, MetricsRecorder, ObservabilityConfig};
use basalt::parser::RequestParser;
use basalt::server::{ConnectionDriver, HttpServer, ServerHandle};

use common::http::{header, parse_response, send_request};

fn start_service(doc_root: &Path, metrics_path: &str) -> (ServerHandle, Arc<MetricsRecorder>) {
    common::test_server::setup_may_runtime();
    let recorder = Arc::new(MetricsRecorder::new());
    let metrics: Arc<dyn HttpMetrics> = recorder.clone();
    let handler = ServiceHandler::new(
        metrics_path,
        MetricsHandler::new(Some(metrics.clone())),
        FileHandler::new(doc_root),
    );
    let parser = RequestParser::new(8192, 8192, 100, 1024 * 1024);
    let driver = ConnectionDriver::new(
        Arc::new(handler),
        Arc::new(parser),
        Duration::from_secs(2),
        Some(metrics),
        ObservabilityConfig::new(false, true, metrics_path),
        AccessLogger::new(false),
    );
    let handle = HttpServer::new(driver).start("127.0.0.1:0").unwrap();
    handle.wait_ready().unwrap();
    (handle, recorder)
}

#[test]
fn metrics_endpoint_serves_json_snapshot() {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("index.html"), "hello").unwrap();
    let (handle, _) = start_service(root.path(), "/metrics");
    let addr = handle.addr();

    // Generate some traffic first so the snapshot has counts.
    send_request(&addr, "GET / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n");
    send_request(&addr, "GET /missing HTTP/1.1\r\nHost: x\r\n\r\n");
    // Records are emitted after the response bytes; give them a beat to land.
    std::thread::sleep(Duration::from_millis(100));

    let raw = send_request(&addr, "GET /metrics HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n");
    handle.stop();

    let (status, headers, body) = parse_response(&raw);
    assert_eq!(status, 200);
    assert_eq!(
        header(&headers, "Content-Type"),
        Some("application/json; charset=UTF-8")
    );

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["totalRequests"], 2);
    assert_eq!(json["statusCounts"]["SUCCESS"], 1);
    assert_eq!(json["statusCounts"]["CLIENT_ERROR"], 1);
    assert!(json["bytesSent"].as_u64().unwrap() > 0);
    assert!(json["latencyBuckets"]["lt_100ms"].is_u64());
    assert!(json["activeConnections"].is_i64());
}

#[test]
fn metrics_endpoint_rejects_non_get() {
    let root = tempfile::tempdir().unwrap();
    let (handle, _) = start_service(root.path(), "/metrics");
    let addr = handle.addr();

    let raw = send_request(
        &addr,
        "POST /metrics HTTP/1.1\r\nHost: x\r\nContent-Length: 0\r\n\r\n",
    );
    handle.stop();

    let (status, headers, _) = parse_response(&raw);
    assert_eq!(status, 405);
    assert_eq!(header(&headers, "Allow"), Some("GET"));
}

#[test]
fn metrics_path_is_configurable() {
    let root = tempfile::tempdir().unwrap();
    let (handle, _) = start_service(root.path(), "/internal/stats");
    let addr = handle.addr();

    let raw = send_request(
        &addr,
        "GET /internal/stats HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
    );
    let (status, headers, _) = parse_response(&raw);
    assert_eq!(status, 200);
    assert_eq!(
        header(&headers, "Content-Type"),
        Some("application/json; charset=UTF-8")
    );

    // The default path now falls through to file resolution.
    let raw = send_request(&addr, "GET /metrics HTTP/1.1\r\nHost: x\r\n\r\n");
    handle.stop();
    let (status, _, _) = parse_response(&raw);
    assert_eq!(status, 404);
}

#[test]
fn metrics_requests_keep_the_connection_alive() {
    let root = tempfile::tempdir().unwrap();
    let (handle, _) = start_service(root.path(), "/metrics");
    let addr = handle.addr();

    let raw = send_request(
        &addr,
        "GET /metrics HTTP/1.1\r\nHost: x\r\n\r\nGET /metrics HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
    );
    handle.stop();

    assert_eq!(raw.matches("HTTP/1.1 200 OK\r\n").count(), 2);
}
