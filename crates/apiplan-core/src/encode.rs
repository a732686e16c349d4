//! Percent-encoding for URL path segments and query components (RFC 3986)

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Everything except the RFC 3986 unreserved set.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Encode a value for substitution into one path segment.
///
/// Slashes are encoded too: a value never adds a segment to the route.
#[must_use]
pub fn path_segment(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Encode a query-string key or value.
#[must_use]
pub fn query_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Render a parameter value the way it travels on the wire (strings unquoted).
#[must_use]
pub fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_and_slash_are_encoded() {
        assert_eq!(path_segment("kalo mire"), "kalo%20mire");
        assert_eq!(path_segment("a/b"), "a%2Fb");
    }

    #[test]
    fn unreserved_pass_through() {
        assert_eq!(path_segment("Az09-._~"), "Az09-._~");
    }

    #[test]
    fn multibyte_is_encoded_per_byte() {
        assert_eq!(path_segment("é"), "%C3%A9");
    }

    #[test]
    fn percent_and_plus_are_encoded() {
        assert_eq!(path_segment("50%+1"), "50%25%2B1");
        assert_eq!(query_component("a+b c"), "a%2Bb%20c");
    }

    #[test]
    fn query_reserved_chars() {
        assert_eq!(query_component("a&b=c"), "a%26b%3Dc");
    }

    #[test]
    fn value_to_string_forms() {
        assert_eq!(value_to_string(&serde_json::json!("x y")), "x y");
        assert_eq!(value_to_string(&serde_json::json!(42)), "42");
        assert_eq!(value_to_string(&serde_json::json!(true)), "true");
        assert_eq!(value_to_string(&serde_json::json!(["a", 1])), "a,1");
    }
}
