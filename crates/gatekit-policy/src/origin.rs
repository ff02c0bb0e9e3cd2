//! Origin normalization.

use std::fmt;

use url::Url;

/// A normalized web origin: `scheme://host[:port]`, default ports omitted.
///
/// `ws:`/`wss:` URLs collapse onto `http:`/`https:` origin form so that a
/// WebSocket endpoint and its HTTP origin deduplicate to one source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Origin {
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl Origin {
    /// Resolve a raw URL string against a base URL and normalize it.
    ///
    /// Returns `None` for unparseable URLs and for any scheme other than
    /// http(s)/ws(s): a discarded candidate, not an error. Empty strings
    /// and strings with embedded whitespace are not URL candidates.
    pub fn resolve(raw: &str, base: &Url) -> Option<Origin> {
        let raw = raw.trim();
        if raw.is_empty() || raw.chars().any(|c| c.is_whitespace()) {
            return None;
        }
        let url = Url::options().base_url(Some(base)).parse(raw).ok()?;
        let scheme = match url.scheme() {
            "http" | "ws" => "http",
            "https" | "wss" => "https",
            _ => return None,
        };
        let host = url.host_str()?.to_string();
        // Url::port() is None when the port matches the scheme default,
        // which is exactly the origin form we want.
        Some(Origin {
            scheme: scheme.to_string(),
            host,
            port: url.port(),
        })
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}://{}:{}", self.scheme, self.host, port),
            None => write!(f, "{}://{}", self.scheme, self.host),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    #[test]
    fn resolves_absolute() {
        let origin = Origin::resolve("http://evil.test/x.png", &base()).unwrap();
        assert_eq!(origin.to_string(), "http://evil.test");
    }

    #[test]
    fn resolves_relative_against_base() {
        let origin = Origin::resolve("/assets/app.js", &base()).unwrap();
        assert_eq!(origin.to_string(), "https://example.com");
    }

    #[test]
    fn keeps_explicit_port() {
        let origin = Origin::resolve("http://localhost:1234/x", &base()).unwrap();
        assert_eq!(origin.to_string(), "http://localhost:1234");
    }

    #[test]
    fn omits_default_port() {
        let origin = Origin::resolve("https://cdn.example.com:443/lib.js", &base()).unwrap();
        assert_eq!(origin.to_string(), "https://cdn.example.com");
    }

    #[test]
    fn collapses_websocket_schemes() {
        let wss = Origin::resolve("wss://sock.example.com/feed", &base()).unwrap();
        assert_eq!(wss.to_string(), "https://sock.example.com");

        let ws = Origin::resolve("ws://sock.example.com:8081/feed", &base()).unwrap();
        assert_eq!(ws.to_string(), "http://sock.example.com:8081");

        // Dedups against the equivalent https origin.
        let https = Origin::resolve("https://sock.example.com/", &base()).unwrap();
        assert_eq!(wss, https);
    }

    #[test]
    fn discards_invalid_and_other_schemes() {
        assert!(Origin::resolve("data:text/plain,hi", &base()).is_none());
        assert!(Origin::resolve("javascript:alert(1)", &base()).is_none());
        assert!(Origin::resolve("not a url", &base()).is_none());
        assert!(Origin::resolve("", &base()).is_none());
        assert!(Origin::resolve("http://", &base()).is_none());
    }
}
