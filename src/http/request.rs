//! Inbound request inspection.
//!
//! The only thing the gate reads from the inbound URI is the `url` query
//! parameter; the inbound path is ignored and later replaced by the target's.

use axum::http::Uri;
use url::form_urlencoded;

/// Name of the query parameter carrying the target URL.
pub const TARGET_PARAM: &str = "url";

/// Decoded value of the first `url` parameter.
///
/// An empty value counts as missing.
pub fn target_param(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == TARGET_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(uri: &str) -> Option<String> {
        target_param(&uri.parse::<Uri>().unwrap())
    }

    #[test]
    fn decodes_target() {
        assert_eq!(
            param("/?url=https%3A%2F%2Fexample.com%2Fpath%3Fx%3D1").as_deref(),
            Some("https://example.com/path?x=1")
        );
        assert_eq!(
            param("/?url=https://example.com/path?x=1").as_deref(),
            Some("https://example.com/path?x=1")
        );
    }

    #[test]
    fn missing_or_empty_is_none() {
        assert_eq!(param("/"), None);
        assert_eq!(param("/?other=1"), None);
        assert_eq!(param("/?url="), None);
        assert_eq!(param("/?url"), None);
    }

    #[test]
    fn first_occurrence_wins() {
        assert_eq!(
            param("/?url=http://a.example&url=http://b.example").as_deref(),
            Some("http://a.example")
        );
    }

    #[test]
    fn inbound_path_is_irrelevant() {
        assert_eq!(param("/some/path?url=http://a.example").as_deref(), Some("http://a.example"));
    }
}
