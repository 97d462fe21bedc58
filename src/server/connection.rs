use std::io::{self, BufReader, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use may::net::TcpStream;
use tracing::{debug, error, info, info_span, warn};

use crate::handler::RequestHandler;
use crate::http::{Method, Request, Response, Status};
use crate::ids::RequestId;
use crate::observability::{AccessLogger, Entry, HttpMetrics, ObservabilityConfig};
use crate::parser::{ParseError, RequestParser};

/// Drives one accepted connection through the keep-alive loop.
///
/// Owns nothing shared except the metrics sink: parser and handler hold only
/// immutable configuration, and every per-request value (reader position,
/// request id, timing) lives on this coroutine's stack. Responses are fully
/// written before the next request is parsed, so pipelined requests are
/// served in order.
pub struct ConnectionDriver {
    handler: Arc<dyn RequestHandler>,
    parser: Arc<RequestParser>,
    read_timeout: Duration,
    metrics: Option<Arc<dyn HttpMetrics>>,
    observability: ObservabilityConfig,
    access_logger: AccessLogger,
}

/// Balances the active-connection gauge on every exit path, panics included.
struct ConnectionGauge<'a>(Option<&'a dyn HttpMetrics>);

impl<'a> ConnectionGauge<'a> {
    fn open(metrics: Option<&'a dyn HttpMetrics>) -> Self {
        if let Some(metrics) = metrics {
            metrics.connection_opened();
        }
        Self(metrics)
    }
}

impl Drop for ConnectionGauge<'_> {
    fn drop(&mut self) {
        if let Some(metrics) = self.0 {
            metrics.connection_closed();
        }
    }
}

impl ConnectionDriver {
    pub fn new(
        handler: Arc<dyn RequestHandler>,
        parser: Arc<RequestParser>,
        read_timeout: Duration,
        metrics: Option<Arc<dyn HttpMetrics>>,
        observability: ObservabilityConfig,
        access_logger: AccessLogger,
    ) -> Self {
        Self {
            handler,
            parser,
            read_timeout,
            metrics,
            observability,
            access_logger,
        }
    }

    /// Handle the connection until either side closes it. The socket is
    /// dropped, and with it closed, on every return path.
    pub fn handle(&self, stream: TcpStream) {
        let remote = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        debug!("accepted connection from {remote}");

        if let Err(e) = self.serve(&stream, &remote) {
            error!("error setting up connection from {remote}: {e}");
        }

        debug!("connection closed: {remote}");
    }

    fn enabled_metrics(&self) -> Option<&dyn HttpMetrics> {
        if !self.observability.is_metrics_enabled() {
            return None;
        }
        self.metrics.as_deref()
    }

    fn serve(&self, stream: &TcpStream, remote: &str) -> io::Result<()> {
        stream.set_read_timeout(Some(self.read_timeout))?;

        // One buffered reader for the whole connection: recreating it per
        // request would strand pipelined bytes already pulled into the buffer.
        let mut input = BufReader::new(stream.try_clone()?);
        let mut output = stream.try_clone()?;

        let _gauge = ConnectionGauge::open(self.enabled_metrics());

        let mut keep_alive = true;
        while keep_alive {
            let start = Instant::now();

            // Seeded before parsing so parse-failure logs carry an id;
            // replaced by the client's X-Request-Id after a successful parse.
            let mut request_id = RequestId::new();
            let span = info_span!("request", request_id = tracing::field::Empty);
            span.record("request_id", tracing::field::display(&request_id));
            let _guard = span.enter();

            let request = match self.parser.parse(&mut input) {
                Ok(Some(request)) => request,
                Ok(None) => break, // clean EOF between requests
                Err(err) => {
                    self.finish_parse_failure(&mut output, remote, err, start, &request_id);
                    break;
                }
            };

            request_id = request_id.adopt(request.header("X-Request-Id"));
            span.record("request_id", tracing::field::display(&request_id));

            info!(
                "{} {} {} from {remote}",
                request.method(),
                request.path(),
                request.version()
            );

            let handled = catch_unwind(AssertUnwindSafe(|| self.handler.handle(&request)));
            let response = match handled {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    warn!("handler I/O error from {remote}: {e}");
                    self.finish_with_error(&mut output, remote, Some(&request), start, &request_id);
                    break;
                }
                Err(panic) => {
                    error!("handler panicked serving {remote}: {panic:?}");
                    self.finish_with_error(&mut output, remote, Some(&request), start, &request_id);
                    break;
                }
            };

            let response = response.with_version(request.version());

            // Handler directive priority: an explicit Connection directive on
            // the response overrides the client's preference.
            let handler_has_directive = response.has_connection_directive();
            let final_keep_alive = if handler_has_directive {
                response.is_connection_persistent()
            } else {
                request.is_keep_alive()
            };
            let response = if handler_has_directive {
                response
            } else {
                response.with_keep_alive(final_keep_alive)
            };
            keep_alive = final_keep_alive;

            let written = if request.method() == Method::Head {
                response.write_headers_only(&mut output)
            } else {
                response.write_full(&mut output)
            };

            match written {
                Ok(()) => {
                    debug!("response: {} - keep_alive: {keep_alive}", response.status());
                    self.finalize(remote, Some(&request), &response, start.elapsed(), &request_id);
                }
                Err(e) => {
                    warn!("I/O error writing to {remote}: {e}");
                    self.finish_with_error(&mut output, remote, Some(&request), start, &request_id);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Error funnel for parse failures. Timeouts become a synthetic 408 that
    /// never touches the socket; protocol violations get their mapped error
    /// page and transport faults a 500. Every path closes the connection and
    /// still emits one observability record.
    fn finish_parse_failure(
        &self,
        output: &mut impl Write,
        remote: &str,
        err: ParseError,
        start: Instant,
        request_id: &RequestId,
    ) {
        if err.is_timeout() {
            debug!("read timeout from {remote}: {err}");
            let response = Response::new()
                .with_status(Status::RequestTimeout)
                .with_keep_alive(false)
                .with_body_length(0);
            self.finalize(remote, None, &response, start.elapsed(), request_id);
            return;
        }
        match err {
            ParseError::Protocol { .. } => {
                warn!("parse error from {remote}: {err}");
                let response = Response::error(err.status(), &err.to_string());
                self.try_write(output, remote, &response);
                self.finalize(remote, None, &response, start.elapsed(), request_id);
            }
            ParseError::Io(e) => {
                warn!("I/O error reading from {remote}: {e}");
                let response = Response::internal_server_error();
                self.try_write(output, remote, &response);
                self.finalize(remote, None, &response, start.elapsed(), request_id);
            }
        }
    }

    /// Funnel for handler failures and write errors: best-effort 500, one
    /// observability record, connection closed.
    fn finish_with_error(
        &self,
        output: &mut impl Write,
        remote: &str,
        request: Option<&Request>,
        start: Instant,
        request_id: &RequestId,
    ) {
        let response = Response::internal_server_error();
        self.try_write(output, remote, &response);
        self.finalize(remote, request, &response, start.elapsed(), request_id);
    }

    /// Write an error response, swallowing failures so one broken socket
    /// cannot cascade.
    fn try_write(&self, output: &mut impl Write, remote: &str, response: &Response) {
        if let Err(e) = response.write_full(output) {
            error!("failed to write response to {remote}: {e}");
        }
    }

    /// Exactly one access-log entry and one metrics record per iteration,
    /// on success and failure alike. HEAD reports zero bytes written even
    /// though Content-Length advertises the GET size.
    fn finalize(
        &self,
        remote: &str,
        request: Option<&Request>,
        response: &Response,
        duration: Duration,
        request_id: &RequestId,
    ) {
        let duration_ms = duration.as_millis() as u64;
        let head_request = request.is_some_and(|r| r.method() == Method::Head);
        let bytes_written = if head_request {
            0
        } else {
            response.bytes_written()
        };

        if self.observability.is_access_log_enabled() {
            self.access_logger.log(&Entry {
                remote,
                method: request.map(Request::method),
                path: request.map(Request::path),
                query: request.and_then(Request::query_string),
                version: request.map(Request::version).unwrap_or(response.version()),
                status: response.status(),
                content_length: request.map(Request::content_length).unwrap_or(0),
                bytes_written,
                duration_ms,
                keep_alive: response.is_connection_persistent(),
                request_id: request_id.as_str(),
            });
        }

        if let Some(metrics) = self.enabled_metrics() {
            metrics.record_request(
                request.map(Request::method),
                response.status(),
                duration_ms,
                bytes_written,
            );
        }
    }
}
