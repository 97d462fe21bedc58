use std::fmt;

/// Supported protocol versions. Anything else on the request line is
/// answered with `505 HTTP Version Not Supported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    /// HTTP/1.0, non-persistent connections by default.
    Http10,
    /// HTTP/1.1, persistent connections by default.
    Http11,
}

impl Version {
    /// Parse the exact version literal from a request line.
    pub fn parse(s: &str) -> Option<Version> {
        match s {
            "HTTP/1.0" => Some(Version::Http10),
            "HTTP/1.1" => Some(Version::Http11),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }

    pub fn defaults_to_keep_alive(self) -> bool {
        self == Version::Http11
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exact_literals_only() {
        assert_eq!(Version::parse("HTTP/1.1"), Some(Version::Http11));
        assert_eq!(Version::parse("HTTP/1.0"), Some(Version::Http10));
        assert_eq!(Version::parse("HTTP/2"), None);
        assert_eq!(Version::parse("http/1.1"), None);
        assert_eq!(Version::parse("HTTP/1.1 "), None);
    }

    #[test]
    fn keep_alive_defaults() {
        assert!(Version::Http11.defaults_to_keep_alive());
        assert!(!Version::Http10.defaults_to_keep_alive());
    }
}
