use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use super::RequestHandler;
use crate::http::{Method, Request, Response, Status};

const DEFAULT_INDEX: &str = "index.html";

/// Serves files from a document root with path-traversal containment.
///
/// Requested paths are resolved lexically against the root and must stay
/// under it; anything that escapes is a 404, indistinguishable from a
/// missing file. The path arrives from the parser undecoded, so encoded
/// traversal (`%2e%2e`) never resolves to a parent directory.
///
/// Holds only the normalized root, so a single instance is shared across
/// all connections.
#[derive(Debug, Clone)]
pub struct FileHandler {
    document_root: PathBuf,
}

impl FileHandler {
    /// Create a handler rooted at `document_root`, creating the directory if
    /// it does not exist yet.
    pub fn new(document_root: impl Into<PathBuf>) -> Self {
        let raw: PathBuf = document_root.into();
        let absolute = if raw.is_absolute() {
            raw
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&raw))
                .unwrap_or(raw)
        };
        let document_root = normalize(&absolute);

        if !document_root.exists() {
            match fs::create_dir_all(&document_root) {
                Ok(()) => info!("created document root {}", document_root.display()),
                Err(e) => warn!(
                    "failed to create document root {}: {e}",
                    document_root.display()
                ),
            }
        }
        info!("serving files from {}", document_root.display());

        Self { document_root }
    }

    pub fn document_root(&self) -> &Path {
        &self.document_root
    }

    /// Map a request path to an absolute file path under the document root,
    /// or `None` when the path escapes it.
    fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let clean = request_path.strip_prefix('/').unwrap_or(request_path);
        let clean = if clean.is_empty() { "." } else { clean };

        let mut resolved = self.document_root.clone();
        for component in Path::new(clean).components() {
            match component {
                Component::Normal(segment) => resolved.push(segment),
                Component::CurDir => {}
                Component::ParentDir => {
                    resolved.pop();
                }
                Component::RootDir | Component::Prefix(_) => return None,
            }
        }

        if !resolved.starts_with(&self.document_root) {
            return None;
        }
        Some(resolved)
    }
}

impl RequestHandler for FileHandler {
    fn handle(&self, request: &Request) -> io::Result<Response> {
        if !matches!(request.method(), Method::Get | Method::Head) {
            return Ok(Response::method_not_allowed("GET, HEAD"));
        }

        let Some(resolved) = self.resolve(request.path()) else {
            warn!("path traversal or invalid path: {}", request.path());
            return Ok(Response::not_found());
        };

        if !resolved.exists() {
            debug!("file not found: {}", resolved.display());
            return Ok(Response::not_found());
        }

        let target = if resolved.is_dir() {
            let index = resolved.join(DEFAULT_INDEX);
            if !index.exists() {
                debug!("directory index not found: {}", index.display());
                return Ok(Response::not_found());
            }
            index
        } else {
            resolved
        };

        let size = fs::metadata(&target)?.len();
        let content_type = detect_content_type(&target);
        debug!("serving {} ({size} bytes, {content_type})", target.display());

        Ok(Response::new()
            .with_status(Status::Ok)
            .with_content_type(&content_type)
            .with_body_length(size)
            .with_body_supplier(move || fs::File::open(&target)))
    }
}

/// Resolve `.` and `..` lexically, without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other),
        }
    }
    normalized
}

/// MIME detection: the extension database probe first, then a fixed fallback
/// table for common web types.
fn detect_content_type(path: &Path) -> String {
    if let Some(mime) = mime_guess::from_path(path).first() {
        return mime.to_string();
    }
    fallback_content_type(path).to_string()
}

fn fallback_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match extension.as_str() {
        "html" | "htm" => "text/html; charset=UTF-8",
        "css" => "text/css; charset=UTF-8",
        "js" => "text/javascript; charset=UTF-8",
        "json" => "application/json; charset=UTF-8",
        "xml" => "application/xml; charset=UTF-8",
        "txt" => "text/plain; charset=UTF-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HeaderMap, Version};

    fn request(method: Method, target: &str) -> Request {
        let mut headers = HeaderMap::new();
        headers.set("Host", "test");
        Request::new(method, target.to_string(), Version::Http11, headers, Vec::new())
    }

    fn handler_with_files() -> (tempfile::TempDir, FileHandler) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>It works</h1>").unwrap();
        fs::write(dir.path().join("style.css"), "body{}").unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/index.html"), "docs index").unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();
        let handler = FileHandler::new(dir.path());
        (dir, handler)
    }

    #[test]
    fn serves_existing_file() {
        let (_dir, handler) = handler_with_files();
        let response = handler.handle(&request(Method::Get, "/style.css")).unwrap();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.header("Content-Length"), Some("6"));
        let mut out = Vec::new();
        response.write_full(&mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().ends_with("body{}"));
    }

    #[test]
    fn root_path_serves_index() {
        let (_dir, handler) = handler_with_files();
        let response = handler.handle(&request(Method::Get, "/")).unwrap();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.header("Content-Length"), Some("17"));
    }

    #[test]
    fn directory_serves_its_index() {
        let (_dir, handler) = handler_with_files();
        let response = handler.handle(&request(Method::Get, "/docs")).unwrap();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.header("Content-Length"), Some("10"));
    }

    #[test]
    fn directory_without_index_is_not_found() {
        let (_dir, handler) = handler_with_files();
        let response = handler.handle(&request(Method::Get, "/empty")).unwrap();
        assert_eq!(response.status(), Status::NotFound);
    }

    #[test]
    fn missing_file_is_not_found() {
        let (_dir, handler) = handler_with_files();
        let response = handler.handle(&request(Method::Get, "/nope.txt")).unwrap();
        assert_eq!(response.status(), Status::NotFound);
    }

    #[test]
    fn traversal_is_contained() {
        let (_dir, handler) = handler_with_files();
        for path in [
            "/../../../etc/passwd",
            "/../index.html",
            "/docs/../../outside",
            "//etc/passwd",
        ] {
            let response = handler.handle(&request(Method::Get, path)).unwrap();
            assert_eq!(response.status(), Status::NotFound, "path {path:?}");
        }
    }

    #[test]
    fn encoded_traversal_stays_literal() {
        let (_dir, handler) = handler_with_files();
        let response = handler
            .handle(&request(Method::Get, "/%2e%2e/%2e%2e/etc/passwd"))
            .unwrap();
        assert_eq!(response.status(), Status::NotFound);
    }

    #[test]
    fn dotdot_within_root_still_resolves() {
        let (_dir, handler) = handler_with_files();
        let response = handler
            .handle(&request(Method::Get, "/docs/../index.html"))
            .unwrap();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.header("Content-Length"), Some("17"));
    }

    #[test]
    fn resolve_rejects_escapes_and_accepts_root() {
        let (dir, handler) = handler_with_files();
        assert_eq!(handler.resolve("/"), Some(normalize(dir.path())));
        assert!(handler.resolve("/../secret").is_none());
        assert!(handler.resolve("/a/../../secret").is_none());
        assert_eq!(
            handler.resolve("/a/./b"),
            Some(normalize(dir.path()).join("a/b"))
        );
    }

    #[test]
    fn non_get_head_methods_are_rejected() {
        let (_dir, handler) = handler_with_files();
        for method in [Method::Post, Method::Put, Method::Delete, Method::Patch] {
            let response = handler.handle(&request(method, "/index.html")).unwrap();
            assert_eq!(response.status(), Status::MethodNotAllowed);
            assert_eq!(response.header("Allow"), Some("GET, HEAD"));
        }
    }

    #[test]
    fn head_gets_length_without_body() {
        let (_dir, handler) = handler_with_files();
        let response = handler.handle(&request(Method::Head, "/index.html")).unwrap();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.header("Content-Length"), Some("17"));
        let mut out = Vec::new();
        response.write_headers_only(&mut out).unwrap();
        assert!(!String::from_utf8(out).unwrap().contains("It works"));
    }

    #[test]
    fn fallback_table_covers_common_types() {
        assert_eq!(
            fallback_content_type(Path::new("a.html")),
            "text/html; charset=UTF-8"
        );
        assert_eq!(
            fallback_content_type(Path::new("a.HTM")),
            "text/html; charset=UTF-8"
        );
        assert_eq!(
            fallback_content_type(Path::new("a.js")),
            "text/javascript; charset=UTF-8"
        );
        assert_eq!(fallback_content_type(Path::new("a.png")), "image/png");
        assert_eq!(fallback_content_type(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(fallback_content_type(Path::new("a.svg")), "image/svg+xml");
        assert_eq!(fallback_content_type(Path::new("a.zip")), "application/zip");
        assert_eq!(
            fallback_content_type(Path::new("a.weird")),
            "application/octet-stream"
        );
        assert_eq!(
            fallback_content_type(Path::new("no_extension")),
            "application/octet-stream"
        );
    }

    #[test]
    fn detect_prefers_probe_over_fallback() {
        let content_type = detect_content_type(Path::new("page.html"));
        assert!(content_type.starts_with("text/html"), "{content_type}");
    }

    #[test]
    fn normalize_is_lexical() {
        assert_eq!(
            normalize(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(normalize(Path::new("/a/../..")), PathBuf::from("/"));
    }
}
