use std::fmt;

/// Correlation identifier for one request/response cycle.
///
/// Seeded as a fresh UUID v4 before parsing starts so that even
/// parse-failure logs carry an id, then replaced by the client's
/// `X-Request-Id` when one is supplied for cross-service tracing.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Adopt a client-supplied value when present and non-blank, keeping the
    /// generated id otherwise.
    pub fn adopt(self, header_value: Option<&str>) -> Self {
        match header_value {
            Some(value) if !value.trim().is_empty() => Self(value.to_string()),
            _ => self,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn adopts_client_header() {
        let id = RequestId::new().adopt(Some("trace-42"));
        assert_eq!(id.as_str(), "trace-42");
    }

    #[test]
    fn blank_headers_keep_generated_id() {
        let id = RequestId::new();
        let kept = id.clone().adopt(Some("   "));
        assert_eq!(kept, id);
        let kept = id.clone().adopt(None);
        assert_eq!(kept, id);
    }
}
