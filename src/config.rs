//! Environment-variable configuration for the server binary.
//!
//! Every limit has a hardened default; malformed values fall back rather
//! than aborting startup. The parser limits cap what a hostile client can
//! make the server buffer per request.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_REQUEST_LINE: usize = 8192;
pub const DEFAULT_MAX_HEADER_SECTION: usize = 8192;
pub const DEFAULT_MAX_HEADERS: usize = 100;
pub const DEFAULT_MAX_BODY: u64 = 10 * 1024 * 1024;
pub const DEFAULT_CLIENT_READ_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_DOCUMENT_ROOT: &str = "./public";
/// 64 KiB coroutine stacks; the request path keeps its buffers on the heap.
pub const DEFAULT_STACK_SIZE: usize = 0x10000;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub max_request_line: usize,
    pub max_header_section: usize,
    pub max_headers: usize,
    pub max_body: u64,
    pub client_read_timeout: Duration,
    pub document_root: PathBuf,
    pub stack_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_request_line: DEFAULT_MAX_REQUEST_LINE,
            max_header_section: DEFAULT_MAX_HEADER_SECTION,
            max_headers: DEFAULT_MAX_HEADERS,
            max_body: DEFAULT_MAX_BODY,
            client_read_timeout: Duration::from_millis(DEFAULT_CLIENT_READ_TIMEOUT_MS),
            document_root: PathBuf::from(DEFAULT_DOCUMENT_ROOT),
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            port: read_env("PORT", DEFAULT_PORT),
            max_request_line: read_env("HTTP_MAX_REQUEST_LINE_LENGTH", DEFAULT_MAX_REQUEST_LINE),
            max_header_section: read_env("HTTP_MAX_HEADER_SIZE", DEFAULT_MAX_HEADER_SECTION),
            max_headers: read_env("HTTP_MAX_HEADERS_COUNT", DEFAULT_MAX_HEADERS),
            max_body: read_env("HTTP_MAX_CONTENT_LENGTH", DEFAULT_MAX_BODY),
            client_read_timeout: Duration::from_millis(read_env(
                "CLIENT_READ_TIMEOUT_MS",
                DEFAULT_CLIENT_READ_TIMEOUT_MS,
            )),
            document_root: PathBuf::from(
                env::var("DOCUMENT_ROOT").unwrap_or_else(|_| DEFAULT_DOCUMENT_ROOT.to_string()),
            ),
            stack_size: read_stack_size_env("BASALT_STACK_SIZE", DEFAULT_STACK_SIZE),
        }
    }
}

pub(crate) fn read_env<T: FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

pub(crate) fn read_bool_env(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        ),
        _ => default,
    }
}

/// Stack sizes accept decimal or `0x`-prefixed hex.
fn read_stack_size_env(key: &str, default: usize) -> usize {
    let Ok(value) = env::var(key) else {
        return default;
    };
    let value = value.trim();
    if let Some(hex) = value.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).unwrap_or(default)
    } else {
        value.parse().unwrap_or(default)
    }
}
