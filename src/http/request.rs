use super::{HeaderMap, Method, Version};

/// Immutable representation of one parsed HTTP request.
///
/// The raw request-target is split into a path and decoded query parameters
/// at construction. The path is deliberately *not* percent-decoded: the file
/// handler resolves it verbatim, so encoded traversal sequences like
/// `%2e%2e` stay inert literals.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: String,
    path: String,
    query_params: Vec<(String, String)>,
    version: Version,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Request {
    pub fn new(
        method: Method,
        target: String,
        version: Version,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Self {
        let (path, raw_query) = split_target(&target);
        let query_params = parse_query_params(raw_query);
        Self {
            method,
            path,
            query_params,
            target,
            version,
            headers,
            body,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The raw request-target as it appeared on the request line.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Path component of the target, undecoded. Empty for absolute-form
    /// targets without a path (`http://host`).
    pub fn path(&self) -> &str {
        &self.path
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

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Decoded query parameters in first-seen order, duplicates collapsed
    /// last-write-wins.
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query_params
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Reassembled decoded query string for access logging, `None` when the
    /// request carried no parameters.
    pub fn query_string(&self) -> Option<String> {
        if self.query_params.is_empty() {
            return None;
        }
        Some(
            self.query_params
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&"),
        )
    }

    /// Declared `Content-Length`, 0 when absent.
    pub fn content_length(&self) -> u64 {
        self.headers
            .get("Content-Length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    pub fn is_chunked(&self) -> bool {
        self.headers
            .get("Transfer-Encoding")
            .is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
    }

    /// Client-side persistence preference. HTTP/1.1 is persistent unless the
    /// Connection value is exactly `close`; HTTP/1.0 is persistent only for
    /// an exact `keep-alive`. List values are not tokenized.
    pub fn is_keep_alive(&self) -> bool {
        let connection = self.headers.get("Connection");
        match self.version {
            Version::Http11 => !connection.is_some_and(|v| v.eq_ignore_ascii_case("close")),
            Version::Http10 => connection.is_some_and(|v| v.eq_ignore_ascii_case("keep-alive")),
        }
    }
}

/// Split a request-target into (path, raw query). Absolute-form targets
/// contribute the segment from the first `/` after the authority; an
/// authority with no path yields an empty string, not `/`.
fn split_target(target: &str) -> (String, Option<&str>) {
    let (without_query, query) = match target.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (target, None),
    };
    let path = if let Some(rest) = without_query
        .strip_prefix("http://")
        .or_else(|| without_query.strip_prefix("https://"))
    {
        match rest.find('/') {
            Some(i) => &rest[i..],
            None => "",
        }
    } else {
        without_query
    };
    (path.to_string(), query)
}

fn parse_query_params(raw_query: Option<&str>) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = Vec::new();
    if let Some(raw_query) = raw_query {
        for (key, value) in url::form_urlencoded::parse(raw_query.as_bytes()) {
            let key = key.into_owned();
            let value = value.into_owned();
            match params.iter_mut().find(|(name, _)| *name == key) {
                Some((_, slot)) => *slot = value,
                None => params.push((key, value)),
            }
        }
    }
    params
}
