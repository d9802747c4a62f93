//! Origin resolution.
//!
//! Turns the client-supplied `url` parameter into a parsed [`Target`] and the
//! [`OriginKey`] its forwarding handler is cached under.
//!
//! # Design Decisions
//! - Parsing follows the WHATWG URL rules of the `url` crate, so scheme and
//!   host are already lower-cased and a default port is elided before keying.
//!   `HTTPS://Example.com:443/a` and `https://example.com/b` share one key.
//! - Only `http` and `https` are accepted; anything else cannot be forwarded.

use std::fmt;

use url::Url;

use crate::dispatch::error::ProxyError;

/// Canonical `scheme://host[:port]` form of an origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OriginKey(String);

impl OriginKey {
    fn from_url(url: &Url) -> Option<Self> {
        let host = url.host_str()?;
        let key = match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        };
        Some(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OriginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved forwarding target.
#[derive(Debug, Clone)]
pub struct Target {
    url: Url,
    origin: OriginKey,
}

impl Target {
    /// Parse an absolute http(s) URL.
    pub fn parse(input: &str) -> Result<Self, ProxyError> {
        let url = Url::parse(input).map_err(|e| ProxyError::invalid_target(input, e))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProxyError::invalid_target(
                input,
                format!("unsupported scheme `{}`", url.scheme()),
            ));
        }

        let origin = OriginKey::from_url(&url)
            .ok_or_else(|| ProxyError::invalid_target(input, "missing host"))?;

        Ok(Self { url, origin })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn origin(&self) -> &OriginKey {
        &self.origin
    }

    /// Path plus query as sent to the origin. The fragment is never included.
    pub fn path_and_query(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }
}

/// Derive the origin key for a target URL string.
pub fn resolve(input: &str) -> Result<OriginKey, ProxyError> {
    Target::parse(input).map(|target| target.origin)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(input: &str) -> String {
        resolve(input).unwrap().to_string()
    }

    #[test]
    fn same_origin_ignores_path_query_and_fragment() {
        let a = resolve("https://example.com/path?x=1").unwrap();
        let b = resolve("https://example.com/other/thing?y=2#frag").unwrap();
        let c = resolve("https://example.com").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.as_str(), "https://example.com");
    }

    #[test]
    fn scheme_host_and_port_all_distinguish() {
        let base = resolve("https://example.com/a").unwrap();
        assert_ne!(base, resolve("http://example.com/a").unwrap());
        assert_ne!(base, resolve("https://example.org/a").unwrap());
        assert_ne!(base, resolve("https://example.com:8443/a").unwrap());
    }

    #[test]
    fn explicit_port_is_kept() {
        assert_eq!(key("http://localhost:8080/x"), "http://localhost:8080");
        assert_eq!(key("http://[::1]:9000/"), "http://[::1]:9000");
    }

    #[test]
    fn default_port_and_case_are_normalized() {
        assert_eq!(key("HTTPS://Example.COM:443/a"), "https://example.com");
        assert_eq!(key("http://EXAMPLE.com:80"), "http://example.com");
    }

    #[test]
    fn userinfo_does_not_leak_into_key() {
        assert_eq!(key("https://user:pw@example.com/"), "https://example.com");
    }

    #[test]
    fn rejects_relative_and_malformed_input() {
        for input in ["not-a-url", "/just/a/path", "", "http://", "://example.com"] {
            let err = resolve(input).unwrap_err();
            assert!(
                matches!(err, ProxyError::InvalidTarget { .. }),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(resolve("ftp://example.com/file").is_err());
        assert!(resolve("mailto:someone@example.com").is_err());
        assert!(resolve("file:///etc/passwd").is_err());
    }

    #[test]
    fn path_and_query_drops_fragment() {
        let target = Target::parse("https://example.com/path?x=1#section").unwrap();
        assert_eq!(target.path_and_query(), "/path?x=1");

        let target = Target::parse("https://example.com").unwrap();
        assert_eq!(target.path_and_query(), "/");
    }
}
