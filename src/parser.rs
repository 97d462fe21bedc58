//! Streaming HTTP/1.1 request parser with configurable limits.
//!
//! Reads one request at a time from a buffered byte source that may carry
//! several pipelined requests. Every limit exists to bound what a hostile
//! client can make the server buffer: the request line, the header section,
//! the header count and the (possibly chunked) body are all capped.
//!
//! Not thread-safe by contract: each connection drives its own reader.

use std::io::{self, BufRead, Read};

use thiserror::Error;

use crate::http::{HeaderMap, Method, Request, Status, Version};

const CR: u8 = b'\r';
const LF: u8 = b'\n';
/// Chunk-size lines are tiny by construction; anything longer is an attack.
const MAX_CHUNK_SIZE_LINE: usize = 1024;

/// Parse failure carrying the HTTP status the connection loop should answer
/// with. Transport faults are kept separate so timeouts (408) and broken
/// sockets (500) can be told apart from protocol violations.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{message}")]
    Protocol { status: Status, message: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ParseError {
    fn bad_request(message: impl Into<String>) -> Self {
        ParseError::Protocol {
            status: Status::BadRequest,
            message: message.into(),
        }
    }

    fn uri_too_long(message: impl Into<String>) -> Self {
        ParseError::Protocol {
            status: Status::UriTooLong,
            message: message.into(),
        }
    }

    fn payload_too_large(message: impl Into<String>) -> Self {
        ParseError::Protocol {
            status: Status::PayloadTooLarge,
            message: message.into(),
        }
    }

    fn not_implemented(message: impl Into<String>) -> Self {
        ParseError::Protocol {
            status: Status::NotImplemented,
            message: message.into(),
        }
    }

    fn version_not_supported(message: impl Into<String>) -> Self {
        ParseError::Protocol {
            status: Status::HttpVersionNotSupported,
            message: message.into(),
        }
    }

    /// Status for the error response this failure maps to.
    pub fn status(&self) -> Status {
        match self {
            ParseError::Protocol { status, .. } => *status,
            ParseError::Io(_) => Status::InternalServerError,
        }
    }

    /// True when the underlying read hit the socket timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ParseError::Io(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
        )
    }
}

/// Which line is being read, deciding the status of an overflow. 414 is
/// reserved for the request line; oversized header or chunk-size lines are
/// plain 400s.
#[derive(Clone, Copy)]
enum LineKind {
    RequestLine,
    Header,
    ChunkSize,
}

impl LineKind {
    fn overflow(self, limit: usize) -> ParseError {
        match self {
            LineKind::RequestLine => {
                ParseError::uri_too_long(format!("request line exceeds {limit} bytes"))
            }
            LineKind::Header => ParseError::bad_request(format!(
                "header line exceeds remaining section limit of {limit} bytes"
            )),
            LineKind::ChunkSize => ParseError::bad_request("chunk size line too long"),
        }
    }
}

/// Streaming request parser. Holds only limits, so one instance is shared
/// across all connections.
#[derive(Debug, Clone)]
pub struct RequestParser {
    max_request_line: usize,
    max_header_section: usize,
    max_headers: usize,
    max_body: u64,
}

impl RequestParser {
    pub fn new(
        max_request_line: usize,
        max_header_section: usize,
        max_headers: usize,
        max_body: u64,
    ) -> Self {
        Self {
            max_request_line,
            max_header_section,
            max_headers,
            max_body,
        }
    }

    /// Read one request from the stream.
    ///
    /// Returns `Ok(None)` only when EOF arrives before the first byte of the
    /// request line: that is the client cleanly ending a persistent
    /// connection. EOF anywhere else is a `400`.
    pub fn parse<R: BufRead>(&self, input: &mut R) -> Result<Option<Request>, ParseError> {
        let request_line = match read_line(input, self.max_request_line, LineKind::RequestLine)? {
            Some(line) => line,
            None => return Ok(None),
        };
        if request_line.is_empty() {
            return Err(ParseError::bad_request("empty request line"));
        }

        let parts: Vec<&str> = request_line.split(' ').collect();
        if parts.len() != 3 {
            return Err(ParseError::bad_request(
                "malformed request line: expected 'METHOD TARGET VERSION'",
            ));
        }

        let method = Method::parse(parts[0])
            .ok_or_else(|| ParseError::not_implemented(format!("unknown HTTP method: {}", parts[0])))?;

        let target = parts[1];
        if target.is_empty() {
            return Err(ParseError::bad_request("empty request target"));
        }

        let version = Version::parse(parts[2]).ok_or_else(|| {
            ParseError::version_not_supported(format!("unsupported HTTP version: {}", parts[2]))
        })?;

        let headers = self.parse_headers(input)?;

        if version == Version::Http11 && !headers.contains("Host") {
            return Err(ParseError::bad_request(
                "missing required Host header in HTTP/1.1 request",
            ));
        }

        let body = self.parse_body(input, &headers)?;

        Ok(Some(Request::new(
            method,
            target.to_string(),
            version,
            headers,
            body,
        )))
    }

    fn parse_headers<R: BufRead>(&self, input: &mut R) -> Result<HeaderMap, ParseError> {
        let mut headers = HeaderMap::new();
        let mut total_size = 0usize;
        let mut count = 0usize;

        loop {
            let remaining = self.max_header_section.saturating_sub(total_size);
            let line = read_line(input, remaining, LineKind::Header)?.ok_or_else(|| {
                ParseError::bad_request("unexpected end of stream while reading headers")
            })?;
            total_size += line.len() + 2;

            if line.is_empty() {
                break;
            }

            count += 1;
            if count > self.max_headers {
                return Err(ParseError::bad_request(format!(
                    "too many headers: exceeds limit of {}",
                    self.max_headers
                )));
            }

            let colon = match line.find(':') {
                Some(i) if i > 0 => i,
                _ => return Err(ParseError::bad_request("invalid header line: missing colon")),
            };
            let name = line[..colon].trim();
            let value = line[colon + 1..].trim();

            if name.is_empty() {
                return Err(ParseError::bad_request("empty header field name"));
            }
            if !is_valid_token(name) {
                return Err(ParseError::bad_request(format!(
                    "invalid header field name: {name}"
                )));
            }

            headers.set(name, value);
        }

        if total_size > self.max_header_section {
            return Err(ParseError::bad_request(format!(
                "header section exceeds limit of {} bytes",
                self.max_header_section
            )));
        }

        Ok(headers)
    }

    fn parse_body<R: BufRead>(
        &self,
        input: &mut R,
        headers: &HeaderMap,
    ) -> Result<Vec<u8>, ParseError> {
        let chunked = headers
            .get("Transfer-Encoding")
            .is_some_and(|v| v.eq_ignore_ascii_case("chunked"));
        if chunked {
            // RFC 9112 section 6.1: the combination is request smuggling bait.
            if headers.contains("Content-Length") {
                return Err(ParseError::bad_request(
                    "Transfer-Encoding and Content-Length are mutually exclusive",
                ));
            }
            return self.parse_chunked_body(input);
        }

        let Some(raw) = headers.get("Content-Length") else {
            return Ok(Vec::new());
        };

        let content_length: i64 = raw
            .parse()
            .map_err(|_| ParseError::bad_request(format!("invalid Content-Length: {raw}")))?;
        if content_length < 0 {
            return Err(ParseError::bad_request(format!(
                "negative Content-Length: {content_length}"
            )));
        }
        let content_length = content_length as u64;
        if content_length > self.max_body {
            return Err(ParseError::payload_too_large(format!(
                "Content-Length {content_length} exceeds limit of {}",
                self.max_body
            )));
        }

        let mut body = vec![0u8; content_length as usize];
        read_full(input, &mut body)?;
        Ok(body)
    }

    /// Chunked body per RFC 9112 section 7.1:
    /// `HEX-SIZE [";" ext] CRLF data CRLF ... 0 CRLF trailers CRLF`.
    /// Trailer fields are discarded.
    fn parse_chunked_body<R: BufRead>(&self, input: &mut R) -> Result<Vec<u8>, ParseError> {
        let mut body = Vec::new();
        let mut total_size = 0u64;

        loop {
            let line = read_line(input, MAX_CHUNK_SIZE_LINE, LineKind::ChunkSize)?.ok_or_else(
                || ParseError::bad_request("unexpected end of stream before chunk size"),
            )?;
            if line.is_empty() {
                return Err(ParseError::bad_request("empty chunk size line"));
            }

            let size_str = match line.find(';') {
                Some(i) if i > 0 => &line[..i],
                _ => line.as_str(),
            };
            let chunk_size = i64::from_str_radix(size_str.trim(), 16)
                .map_err(|_| ParseError::bad_request(format!("invalid chunk size: {size_str}")))?;
            if chunk_size < 0 {
                return Err(ParseError::bad_request(format!(
                    "negative chunk size: {chunk_size}"
                )));
            }
            let chunk_size = chunk_size as u64;

            if chunk_size == 0 {
                loop {
                    let trailer = read_line(input, self.max_header_section, LineKind::Header)?
                        .ok_or_else(|| {
                            ParseError::bad_request("unexpected end of stream in chunk trailers")
                        })?;
                    if trailer.is_empty() {
                        break;
                    }
                }
                break;
            }

            total_size += chunk_size;
            if total_size > self.max_body {
                return Err(ParseError::payload_too_large(format!(
                    "chunked body size {total_size} exceeds limit of {}",
                    self.max_body
                )));
            }

            let start = body.len();
            body.resize(start + chunk_size as usize, 0);
            read_full(input, &mut body[start..])?;

            let terminator = read_line(input, 2, LineKind::ChunkSize)?.ok_or_else(|| {
                ParseError::bad_request("unexpected end of stream after chunk data")
            })?;
            if !terminator.is_empty() {
                return Err(ParseError::bad_request("missing CRLF after chunk data"));
            }
        }

        Ok(body)
    }
}

/// Read one CRLF-terminated line, enforcing `max_len` on the bytes before
/// the CRLF. Two-state scanner: CR is never buffered, and a CR followed by
/// anything but LF is malformed. Returns `None` only on EOF before the first
/// byte.
fn read_line<R: BufRead>(
    input: &mut R,
    max_len: usize,
    kind: LineKind,
) -> Result<Option<String>, ParseError> {
    let mut line: Vec<u8> = Vec::new();
    let mut prev_was_cr = false;
    let mut read_any = false;
    let mut byte = [0u8; 1];

    loop {
        let n = input.read(&mut byte)?;
        if n == 0 {
            if !read_any {
                return Ok(None);
            }
            return Err(ParseError::bad_request(
                "unexpected end of stream while reading line",
            ));
        }
        read_any = true;
        let b = byte[0];

        if prev_was_cr {
            if b == LF {
                return Ok(Some(latin1_to_string(&line)));
            }
            return Err(ParseError::bad_request(
                "malformed line ending: expected LF after CR",
            ));
        }

        if b == CR {
            prev_was_cr = true;
            continue;
        }

        if line.len() >= max_len {
            return Err(kind.overflow(max_len));
        }
        line.push(b);
    }
}

/// Fill `buf` completely, treating EOF as a framing violation.
fn read_full<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<(), ParseError> {
    let mut total = 0;
    while total < buf.len() {
        let n = input.read(&mut buf[total..])?;
        if n == 0 {
            return Err(ParseError::bad_request(format!(
                "unexpected end of stream: expected {} body bytes, got {total}",
                buf.len()
            )));
        }
        total += n;
    }
    Ok(())
}

/// Status-line and header bytes are ISO-8859-1; every byte maps to the same
/// code point.
fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// RFC 9110 token: ALPHA / DIGIT / `!#$%&'*+-.^_`|~`.
fn is_valid_token(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_tchar)
}

fn is_tchar(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '.' | '^' | '_' | '`' | '|' | '~'
        )
}
