use std::fmt;
use std::io::{self, Read, Write};

use super::{HeaderMap, Status, Version};

const SERVER_IDENT: &str = "basalt/1.0";

/// Deferred producer of a readable body stream. Opened lazily when the
/// response is written, so large files are never materialised in memory.
pub type BodySupplier = Box<dyn Fn() -> io::Result<Box<dyn Read + Send>> + Send + Sync>;

/// Explicit connection persistence carried on a response, distinct from the
/// protocol defaults. `Unset` means the connection loop decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionDirective {
    Unset,
    Persistent,
    Close,
}

/// Builder for HTTP responses, serialized once.
///
/// Defaults to `200 OK` on HTTP/1.1 with a `Server` header and an empty
/// inline body. No `Connection` header is set by default: HTTP/1.1 is
/// persistent unless told otherwise and HTTP/1.0 only persists when asked.
pub struct Response {
    status: Status,
    version: Version,
    headers: HeaderMap,
    body: Vec<u8>,
    body_supplier: Option<BodySupplier>,
    directive: ConnectionDirective,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        let mut headers = HeaderMap::new();
        headers.set("Server", SERVER_IDENT);
        Self {
            status: Status::Ok,
            version: Version::Http11,
            headers,
            body: Vec::new(),
            body_supplier: None,
            directive: ConnectionDirective::Unset,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Set a header field. A `Connection` header additionally records the
    /// handler's explicit directive so the connection loop can honor it.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if name.eq_ignore_ascii_case("Connection") {
            self.directive = if value.eq_ignore_ascii_case("close") {
                ConnectionDirective::Close
            } else {
                ConnectionDirective::Persistent
            };
        }
        self.headers.set(name, value);
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.headers.set("Content-Type", content_type);
        self
    }

    /// Set an inline body and the matching `Content-Length`, replacing any
    /// body supplier.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        self.headers.set("Content-Length", body.len().to_string());
        self.body = body;
        self.body_supplier = None;
        self
    }

    /// Declare the body length without materialising the payload. Pair with
    /// [`Response::with_body_supplier`] to stream the content at write time.
    pub fn with_body_length(mut self, length: u64) -> Self {
        self.headers.set("Content-Length", length.to_string());
        self.body.clear();
        self
    }

    /// Install a supplier that opens a fresh stream each time the body is
    /// written. The stream is closed after the transfer.
    pub fn with_body_supplier<F, R>(mut self, supplier: F) -> Self
    where
        F: Fn() -> io::Result<R> + Send + Sync + 'static,
        R: Read + Send + 'static,
    {
        self.body_supplier = Some(Box::new(move || {
            supplier().map(|stream| Box::new(stream) as Box<dyn Read + Send>)
        }));
        self
    }

    /// Stamp the connection decision onto the header map.
    ///
    /// HTTP/1.1 only carries `Connection: close` when closing (RFC 9112
    /// section 9.6; `keep-alive` is deprecated there), so keeping the
    /// connection removes the header and clears the directive. HTTP/1.0
    /// states both cases explicitly.
    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        match self.version {
            Version::Http11 => {
                if keep_alive {
                    self.headers.remove("Connection");
                    self.directive = ConnectionDirective::Unset;
                } else {
                    self.headers.set("Connection", "close");
                    self.directive = ConnectionDirective::Close;
                }
            }
            Version::Http10 => {
                self.headers
                    .set("Connection", if keep_alive { "keep-alive" } else { "close" });
                self.directive = if keep_alive {
                    ConnectionDirective::Persistent
                } else {
                    ConnectionDirective::Close
                };
            }
        }
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// True when a handler explicitly set a Connection directive, letting the
    /// connection loop give it priority over the request's preference.
    pub fn has_connection_directive(&self) -> bool {
        self.directive != ConnectionDirective::Unset
    }

    /// The explicit directive when set, otherwise the version default.
    pub fn is_connection_persistent(&self) -> bool {
        match self.directive {
            ConnectionDirective::Persistent => true,
            ConnectionDirective::Close => false,
            ConnectionDirective::Unset => self.version.defaults_to_keep_alive(),
        }
    }

    /// Declared body size from the `Content-Length` header, 0 when absent.
    pub fn declared_content_length(&self) -> u64 {
        self.headers
            .get("Content-Length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Body bytes that a full write puts on the wire. Observability reports
    /// 0 for HEAD responses regardless of this value.
    pub fn bytes_written(&self) -> u64 {
        self.declared_content_length()
    }

    fn write_head<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(
            out,
            "{} {} {}\r\n",
            self.version.as_str(),
            self.status.code(),
            self.status.reason()
        )?;
        for (name, value) in self.headers.iter() {
            write!(out, "{name}: {value}\r\n")?;
        }
        out.write_all(b"\r\n")
    }

    /// Write status line, headers and body. The body supplier, when present,
    /// is opened here and dropped after the transfer, including on error.
    pub fn write_full<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.write_head(out)?;
        out.flush()?;
        if let Some(supplier) = &self.body_supplier {
            let mut stream = supplier()?;
            io::copy(&mut stream, out)?;
            out.flush()?;
        } else if !self.body.is_empty() {
            out.write_all(&self.body)?;
            out.flush()?;
        }
        Ok(())
    }

    /// Write status line and headers only, for HEAD responses. Content-Length
    /// still advertises what a GET would have produced.
    pub fn write_headers_only<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.write_head(out)?;
        out.flush()
    }

    /// Standard HTML error page carrying the status code, reason phrase and
    /// an escaped message. Always closes the connection.
    pub fn error(status: Status, message: &str) -> Response {
        Self::error_page(status, Some(message))
    }

    pub fn not_found() -> Response {
        Self::error(
            Status::NotFound,
            "The requested resource was not found on this server.",
        )
    }

    pub fn method_not_allowed(allowed: &str) -> Response {
        Self::error_page(Status::MethodNotAllowed, None).with_header("Allow", allowed)
    }

    pub fn internal_server_error() -> Response {
        Self::error(Status::InternalServerError, "Internal Server Error")
    }

    fn error_page(status: Status, message: Option<&str>) -> Response {
        let code = status.code();
        let reason = status.reason();
        let paragraph = message
            .map(|m| format!("<p>{}</p>\n", escape_html(m)))
            .unwrap_or_default();
        let body = format!(
            "<!DOCTYPE html>\n<html>\n<head><title>{code} {reason}</title></head>\n\
             <body>\n<h1>{code} {reason}</h1>\n{paragraph}</body>\n</html>\n"
        );
        Response::new()
            .with_status(status)
            .with_content_type("text/html; charset=UTF-8")
            .with_body(body)
            .with_keep_alive(false)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers.len())
            .field("body_len", &self.body.len())
            .field("streaming", &self.body_supplier.is_some())
            .finish()
    }
}

/// Escape HTML metacharacters so error messages cannot inject markup.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
